//! Single-assignment deferred values with synchronous, multi-value chaining.
//!
//! A [`Deferred`] settles a stage with a bundle of values (any `T`, usually a
//! tuple) or with a [`SharedError`]. The [`Promise`] for that stage composes
//! follow-up stages with [`Promise::then`], [`Promise::exception`] and ends a
//! chain with [`Promise::finally`]. Continuations run on the calling thread,
//! right away if the stage is already settled, otherwise inside the call that
//! settles it. There is no scheduler.
//!
//! # Examples
//!
//! ```
//! use promise_stage::{make_ready, make_ready_error, StageError};
//! use std::{cell::RefCell, rc::Rc};
//!
//! let seen = Rc::new(RefCell::new(None));
//! let sink = seen.clone();
//! make_ready((100, String::from("PromiseDemo")))
//!     .then(|(num, name)| {
//!         assert_eq!((num, name.as_str()), (100, "PromiseDemo"));
//!         make_ready_error::<()>(StageError::msg("NonExcep"))
//!     })
//!     .finally(move |err| *sink.borrow_mut() = err.map(|e| e.to_string()));
//! assert_eq!(seen.borrow().as_deref(), Some("NonExcep"));
//! ```
pub mod deferred;
pub mod error;
pub mod promise;
pub mod ready;
pub mod state;
pub mod waiter;

pub use deferred::Deferred;
pub use error::{shared, SharedError, StageError};
pub use promise::Promise;
pub use ready::{make_error, make_ready, make_ready_error};
pub use state::{Continuation, State};
pub use waiter::Waiter;

/// Where a stage is in its current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}
