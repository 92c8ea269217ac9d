use std::fmt;
use std::rc::Rc;
use tracing::debug;

use crate::{Deferred, SharedError, StageError, State, Status};

/// The read and compose side of a stage.
///
/// Every chaining operator creates a new stage and returns its `Promise`, so
/// calls can be strung together. A continuation that returns a `Promise` is
/// expected to return one that is already settled, normally built with
/// [`make_ready`](crate::make_ready) or [`make_ready_error`](crate::make_ready_error).
/// A still-pending return is forwarded whenever it settles.
pub struct Promise<T> {
    state: Rc<State<T>>,
}

impl<T> Promise<T> {
    pub(crate) fn from_state(state: Rc<State<T>>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &State<T> {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    /// Consuming read: the stage is back to `Pending` afterwards.
    pub fn value(&self) -> Option<T> {
        self.state.take_value()
    }

    /// Consuming read: the stage is back to `Pending` afterwards.
    pub fn error(&self) -> Option<SharedError> {
        self.state.take_error()
    }

    /// Consuming read of whichever outcome the stage holds.
    ///
    /// ```
    /// use promise_stage::{make_ready, make_ready_error, StageError};
    /// assert_eq!(make_ready(7).try_value().ok(), Some(7));
    /// let err = make_ready_error::<i32>(StageError::msg("bad")).try_value().unwrap_err();
    /// assert!(matches!(err, StageError::Rejected(_)));
    /// ```
    pub fn try_value(&self) -> Result<T, StageError> {
        if let Some(value) = self.state.take_value() {
            return Ok(value);
        }
        match self.state.take_error() {
            Some(err) => Err(StageError::Rejected(err)),
            None => Err(StageError::Pending),
        }
    }
}

impl<T: 'static> Promise<T> {
    /// Run `f` on the bundle once this stage fulfills. A rejection skips `f`
    /// and reaches the returned stage unchanged.
    pub fn then<U, F>(&self, f: F) -> Promise<U>
    where
        U: 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
    {
        let next = Deferred::<U>::new();
        let on_success = {
            let next = next.clone();
            move |value: T| f(value).forward_to(next)
        };
        let on_failure = {
            let next = next.clone();
            move |err: SharedError| next.set_error(err)
        };
        self.state
            .register_both(Box::new(on_success), Box::new(on_failure));
        next.promise()
    }

    /// Run `f` on the error payload once this stage rejects.
    ///
    /// Only the failure side is registered. If this stage fulfills instead,
    /// the returned stage never settles and the bundle stays unread here.
    pub fn exception<U, F>(&self, f: F) -> Promise<U>
    where
        U: 'static,
        F: FnOnce(SharedError) -> Promise<U> + 'static,
    {
        let next = Deferred::<U>::new();
        let on_failure = {
            let next = next.clone();
            move |err: SharedError| f(err).forward_to(next)
        };
        self.state.register_failure(Box::new(on_failure));
        next.promise()
    }

    /// End the chain. `f` runs exactly once with `None` on fulfillment or
    /// with the payload on rejection.
    pub fn finally<F>(&self, f: F)
    where
        F: FnOnce(Option<SharedError>) + 'static,
    {
        self.state
            .register_settled(Box::new(move |outcome: Result<T, SharedError>| f(outcome.err())));
    }

    /// Graft this stage's outcome onto `next`.
    fn forward_to(&self, next: Deferred<T>) {
        if self.status() == Status::Pending {
            debug!(
                bundle = std::any::type_name::<T>(),
                "continuation returned a pending stage, forwarding on settlement"
            );
        }
        self.state.register_settled(Box::new(move |outcome| match outcome {
            Ok(value) => next.set_value(value),
            Err(err) => next.set_error(err),
        }));
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("state", &self.state).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{make_ready, make_ready_error, Deferred, Promise, StageError, Status};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn then_passes_rejection_through() {
        let payload = StageError::msg("E");
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let next = make_ready_error::<i32>(payload.clone()).then(move |num| {
            flag.set(true);
            make_ready(num)
        });
        assert!(!called.get());
        assert_eq!(next.status(), Status::Rejected);
        let err = next.error().expect("rejection forwarded");
        assert!(Rc::ptr_eq(&err, &payload));
    }

    #[test]
    fn then_forwards_returned_value() {
        let next = make_ready((100, String::from("PromiseDemo"))).then(|(num, name)| {
            assert_eq!(num, 100);
            assert_eq!(name, "PromiseDemo");
            make_ready((100, 200))
        });
        assert_eq!(next.value(), Some((100, 200)));
    }

    #[test]
    fn then_forwards_returned_rejection() {
        let next: Promise<i32> =
            make_ready(1).then(|_| make_ready_error(StageError::msg("NonExcep")));
        assert_eq!(next.error().map(|e| e.to_string()).as_deref(), Some("NonExcep"));
    }

    #[test]
    fn then_waits_for_pending_antecedent() {
        let (deferred, promise) = Deferred::<(i32, i32)>::pair();
        let next = promise.then(|(x, y)| make_ready(x + y));
        assert_eq!(next.status(), Status::Pending);
        deferred.set_value((2, 3));
        assert_eq!(next.value(), Some(5));
        assert_eq!(promise.status(), Status::Pending);
    }

    #[test]
    fn then_is_spent_after_first_generation() {
        let (deferred, promise) = Deferred::<i32>::pair();
        let next = promise.then(make_ready);
        deferred.set_value(1);
        assert_eq!(next.status(), Status::Fulfilled);
        // no leftover failure half to push into the still-fulfilled next stage
        deferred.set_error(StageError::msg("gen2"));
        assert_eq!(next.value(), Some(1));
        assert_eq!(next.status(), Status::Pending);
        assert_eq!(promise.error().map(|e| e.to_string()).as_deref(), Some("gen2"));
    }

    #[test]
    fn finally_releases_its_sink_after_firing() {
        let token = Rc::new(());
        let held = token.clone();
        let (deferred, promise) = Deferred::<()>::pair();
        promise.finally(move |_| drop(held));
        assert_eq!(Rc::strong_count(&token), 2);
        deferred.set_value(());
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn then_grafts_a_pending_return() {
        let (inner, inner_promise) = Deferred::<&'static str>::pair();
        let next = make_ready(()).then(move |()| inner_promise);
        assert_eq!(next.status(), Status::Pending);
        inner.set_value("late");
        assert_eq!(next.value(), Some("late"));
    }

    #[test]
    fn exception_stalls_on_fulfillment() {
        let start = make_ready((100, "X"));
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let next = start.exception(move |_| {
            flag.set(true);
            make_ready(())
        });
        assert!(!called.get());
        assert_eq!(next.status(), Status::Pending);
        assert!(next.value().is_none());
        // the antecedent's bundle was never consumed
        assert_eq!(start.value(), Some((100, "X")));
    }

    #[test]
    fn exception_recovers_rejection() {
        let next = make_ready_error::<i32>(StageError::msg("NonExcep")).exception(|err| {
            assert_eq!(err.to_string(), "NonExcep");
            make_ready(())
        });
        assert_eq!(next.status(), Status::Fulfilled);
        assert_eq!(next.value(), Some(()));
    }

    #[test]
    fn exception_may_reject_again() {
        let next = make_ready_error::<()>(StageError::msg("first"))
            .exception(|_| make_ready_error::<u8>(StageError::msg("second")));
        assert_eq!(next.error().map(|e| e.to_string()).as_deref(), Some("second"));
    }

    #[test]
    fn finally_fires_once_on_fulfillment() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        make_ready(5).finally(move |err| sink.borrow_mut().push(err.is_none()));
        assert_eq!(*calls.borrow(), vec![true]);
    }

    #[test]
    fn finally_fires_once_on_rejection() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        make_ready_error::<()>(StageError::msg("boom"))
            .finally(move |err| sink.borrow_mut().push(err.map(|e| e.to_string())));
        assert_eq!(*calls.borrow(), vec![Some("boom".to_string())]);
    }

    #[test]
    fn finally_on_pending_fires_at_settlement() {
        let (deferred, promise) = Deferred::<i32>::pair();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        promise.finally(move |_| counter.set(counter.get() + 1));
        assert_eq!(count.get(), 0);
        deferred.set_error(StageError::msg("late"));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn try_value_reports_each_outcome() {
        let (deferred, promise) = Deferred::<i32>::pair();
        assert!(matches!(promise.try_value(), Err(StageError::Pending)));
        deferred.set_value(9);
        assert_eq!(promise.try_value().ok(), Some(9));
        assert!(matches!(promise.try_value(), Err(StageError::Pending)));
        deferred.set_error(StageError::msg("x"));
        match promise.try_value() {
            Err(StageError::Rejected(err)) => assert_eq!(err.to_string(), "x"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn dropping_unresolved_chain_releases_continuations() {
        let token = Rc::new(());
        let held = token.clone();
        let (deferred, promise) = Deferred::<i32>::pair();
        let _next = promise.then(move |v| {
            drop(held);
            make_ready(v)
        });
        assert_eq!(Rc::strong_count(&token), 2);
        drop(promise);
        drop(deferred);
        assert_eq!(Rc::strong_count(&token), 1);
    }
}
