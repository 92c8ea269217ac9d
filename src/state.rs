//! The settlement record shared by a [`Deferred`](crate::Deferred) and every
//! [`Promise`](crate::Promise) handed out for it.
//!
//! A `State` holds at most one outcome and at most one continuation per side.
//! Reading an outcome, either directly or by dispatching it to a continuation,
//! consumes it and returns the state to [`Status::Pending`]. Dispatch is
//! always synchronous: it runs inside whichever call happens second, the
//! settling call or the registering call.
//!
//! A pair registered with [`State::register_both`] is a single registration
//! covering both sides. Whichever side fires, the whole pair is spent.
use std::cell::RefCell;
use std::fmt;
use tracing::{debug, trace};

use crate::{SharedError, Status};

pub type SuccessFn<T> = Box<dyn FnOnce(T)>;
pub type FailureFn = Box<dyn FnOnce(SharedError)>;
pub type SettledFn<T> = Box<dyn FnOnce(Result<T, SharedError>)>;

/// One unit of deferred work, tagged with the side of the outcome it accepts.
pub enum Continuation<T> {
    OnSuccess(SuccessFn<T>),
    OnFailure(FailureFn),
    /// Either outcome, consumed by whichever arrives first.
    OnSettled(SettledFn<T>),
}

impl<T> Continuation<T> {
    pub fn on_success(f: impl FnOnce(T) + 'static) -> Self {
        Continuation::OnSuccess(Box::new(f))
    }

    pub fn on_failure(f: impl FnOnce(SharedError) + 'static) -> Self {
        Continuation::OnFailure(Box::new(f))
    }

    pub fn on_settled(f: impl FnOnce(Result<T, SharedError>) + 'static) -> Self {
        Continuation::OnSettled(Box::new(f))
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::OnSuccess(_) => f.write_str("OnSuccess(..)"),
            Continuation::OnFailure(_) => f.write_str("OnFailure(..)"),
            Continuation::OnSettled(_) => f.write_str("OnSettled(..)"),
        }
    }
}

enum Slot<T> {
    Pending,
    Fulfilled(T),
    Rejected(SharedError),
}

enum Dispatch<T> {
    Value(SuccessFn<T>, T),
    Error(FailureFn, SharedError),
    Settled(SettledFn<T>, Result<T, SharedError>),
}

struct Inner<T> {
    slot: Slot<T>,
    success: Option<SuccessFn<T>>,
    failure: Option<FailureFn>,
    // Occupies both sides; never set together with `success` or `failure`.
    settled: Option<SettledFn<T>>,
}

impl<T> Inner<T> {
    fn status(&self) -> Status {
        match self.slot {
            Slot::Pending => Status::Pending,
            Slot::Fulfilled(_) => Status::Fulfilled,
            Slot::Rejected(_) => Status::Rejected,
        }
    }

    fn take_value(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.slot, Slot::Pending) {
            Slot::Fulfilled(value) => Some(value),
            other => {
                self.slot = other;
                None
            }
        }
    }

    fn take_error(&mut self) -> Option<SharedError> {
        match std::mem::replace(&mut self.slot, Slot::Pending) {
            Slot::Rejected(err) => Some(err),
            other => {
                self.slot = other;
                None
            }
        }
    }

    fn has_continuation(&self) -> bool {
        self.success.is_some() || self.failure.is_some() || self.settled.is_some()
    }

    /// Pair the settled outcome with the continuation for its side. Nothing is
    /// consumed when that side has no continuation.
    fn ready(&mut self) -> Option<Dispatch<T>> {
        match self.slot {
            Slot::Fulfilled(_) if self.success.is_some() => {
                let on_success = self.success.take()?;
                let value = self.take_value()?;
                Some(Dispatch::Value(on_success, value))
            }
            Slot::Fulfilled(_) if self.settled.is_some() => {
                let on_settled = self.settled.take()?;
                let value = self.take_value()?;
                Some(Dispatch::Settled(on_settled, Ok(value)))
            }
            Slot::Rejected(_) if self.failure.is_some() => {
                let on_failure = self.failure.take()?;
                let err = self.take_error()?;
                Some(Dispatch::Error(on_failure, err))
            }
            Slot::Rejected(_) if self.settled.is_some() => {
                let on_settled = self.settled.take()?;
                let err = self.take_error()?;
                Some(Dispatch::Settled(on_settled, Err(err)))
            }
            _ => None,
        }
    }
}

pub struct State<T> {
    inner: RefCell<Inner<T>>,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            inner: RefCell::new(Inner {
                slot: Slot::Pending,
                success: None,
                failure: None,
                settled: None,
            }),
        }
    }
}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("State")
                .field("status", &inner.status())
                .field("success", &inner.success.is_some())
                .field("failure", &inner.failure.is_some())
                .field("settled", &inner.settled.is_some())
                .finish(),
            Err(_) => f.write_str("State { <dispatching> }"),
        }
    }
}

impl<T> State<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Status {
        self.inner.borrow().status()
    }

    /// Consuming read of the bundle. Leaves a rejected or pending state as it is.
    pub fn take_value(&self) -> Option<T> {
        self.inner.borrow_mut().take_value()
    }

    /// Consuming read of the error payload. Leaves a fulfilled or pending state
    /// as it is.
    pub fn take_error(&self) -> Option<SharedError> {
        self.inner.borrow_mut().take_error()
    }

    /// Fulfill the state and dispatch to the success continuation, if any.
    ///
    /// # Panics
    /// Panics if the state still holds an outcome nobody has consumed.
    pub fn settle_value(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            assert!(
                inner.status() == Status::Pending,
                "settle_value on a stage that is already {:?}",
                inner.status()
            );
            inner.slot = Slot::Fulfilled(value);
        }
        trace!(bundle = std::any::type_name::<T>(), "stage fulfilled");
        self.dispatch();
    }

    /// Reject the state and dispatch to the failure continuation, if any.
    ///
    /// # Panics
    /// Panics if the state still holds an outcome nobody has consumed.
    pub fn settle_error(&self, err: SharedError) {
        {
            let mut inner = self.inner.borrow_mut();
            assert!(
                inner.status() == Status::Pending,
                "settle_error on a stage that is already {:?}",
                inner.status()
            );
            inner.slot = Slot::Rejected(err);
        }
        trace!(bundle = std::any::type_name::<T>(), "stage rejected");
        self.dispatch();
    }

    pub fn register(&self, continuation: Continuation<T>) {
        match continuation {
            Continuation::OnSuccess(f) => self.register_success(f),
            Continuation::OnFailure(f) => self.register_failure(f),
            Continuation::OnSettled(f) => self.register_settled(f),
        }
    }

    /// Replaces the success side. A pair registered earlier is released as a
    /// whole, its failure half included.
    pub fn register_success(&self, on_success: SuccessFn<T>) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            (inner.success.take(), inner.settled.take())
        };
        log_released("success", released.0.is_some(), released.1.is_some());
        drop(released);
        self.inner.borrow_mut().success = Some(on_success);
        self.dispatch();
    }

    /// Only a rejection reaches `on_failure`. A fulfilled outcome stays in the
    /// state untouched until someone reads it. A pair registered earlier is
    /// released as a whole.
    pub fn register_failure(&self, on_failure: FailureFn) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            (inner.failure.take(), inner.settled.take())
        };
        log_released("failure", released.0.is_some(), released.1.is_some());
        drop(released);
        self.inner.borrow_mut().failure = Some(on_failure);
        self.dispatch();
    }

    /// Register both sides as one pair: once either fires the other is dropped.
    pub fn register_both(&self, on_success: SuccessFn<T>, on_failure: FailureFn)
    where
        T: 'static,
    {
        self.register_settled(Box::new(move |outcome| match outcome {
            Ok(value) => on_success(value),
            Err(err) => on_failure(err),
        }));
    }

    /// Register one continuation for whichever outcome arrives, replacing
    /// everything registered before.
    pub fn register_settled(&self, on_settled: SettledFn<T>) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            (
                inner.success.take(),
                inner.failure.take(),
                inner.settled.take(),
            )
        };
        if released.0.is_some() || released.1.is_some() || released.2.is_some() {
            debug!("replacing continuations with a settled pair");
        }
        drop(released);
        self.inner.borrow_mut().settled = Some(on_settled);
        self.dispatch();
    }

    /// Drop every continuation and any unread outcome.
    pub fn reset(&self) {
        let (slot, success, failure, settled) = {
            let mut inner = self.inner.borrow_mut();
            (
                std::mem::replace(&mut inner.slot, Slot::Pending),
                inner.success.take(),
                inner.failure.take(),
                inner.settled.take(),
            )
        };
        debug!(
            released_success = success.is_some(),
            released_failure = failure.is_some(),
            released_pair = settled.is_some(),
            had_outcome = !matches!(slot, Slot::Pending),
            "stage reset"
        );
    }

    // The borrow is released before the continuation runs, so a continuation
    // may freely settle or register on any stage, this one included.
    fn dispatch(&self) {
        let ready = self.inner.borrow_mut().ready();
        match ready {
            Some(Dispatch::Value(on_success, value)) => {
                trace!(bundle = std::any::type_name::<T>(), "dispatching value");
                on_success(value);
            }
            Some(Dispatch::Error(on_failure, err)) => {
                trace!(error = %err, "dispatching error");
                on_failure(err);
            }
            Some(Dispatch::Settled(on_settled, outcome)) => {
                trace!(fulfilled = outcome.is_ok(), "dispatching to pair");
                on_settled(outcome);
            }
            None => {}
        }
    }
}

fn log_released(side: &'static str, single: bool, pair: bool) {
    if single {
        debug!(side, "replacing continuation");
    }
    if pair {
        debug!(side, "releasing paired continuation");
    }
}

impl<T> Drop for State<T> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.has_continuation() {
            trace!(
                status = ?inner.status(),
                "dropping stage with continuations that never fired"
            );
        }
    }
}
