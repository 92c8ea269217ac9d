use std::fmt;
use std::rc::Rc;

use crate::{Promise, SharedError, State};

/// The write side of a stage. Settling is the only way out of `Pending`.
///
/// Handles may be cloned, which is how a chaining operator hands the next
/// stage to both of its adapters. Only one of them ever settles it.
///
/// # Examples
///
/// ```
/// use promise_stage::{Deferred, Status};
/// let (deferred, promise) = Deferred::<(i32, &str)>::pair();
/// assert_eq!(promise.status(), Status::Pending);
/// deferred.set_value((1, "one"));
/// assert_eq!(promise.value(), Some((1, "one")));
/// ```
pub struct Deferred<T> {
    state: Rc<State<T>>,
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(State::new()),
        }
    }

    pub fn pair() -> (Self, Promise<T>) {
        let deferred = Self::new();
        let promise = deferred.promise();
        (deferred, promise)
    }

    /// A facade over the same stage, available before or after settlement.
    pub fn promise(&self) -> Promise<T> {
        Promise::from_state(self.state.clone())
    }

    /// # Panics
    /// Panics if the stage still holds an unconsumed outcome.
    pub fn set_value(&self, value: T) {
        self.state.settle_value(value)
    }

    /// # Panics
    /// Panics if the stage still holds an unconsumed outcome.
    pub fn set_error(&self, err: SharedError) {
        self.state.settle_error(err)
    }

    pub fn reset(&self) {
        self.state.reset()
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("state", &self.state).finish()
    }
}
