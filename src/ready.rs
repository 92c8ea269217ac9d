//! Factories for stages whose outcome is already known.
use crate::{shared, Deferred, Promise, SharedError};

/// A stage already fulfilled with `value`.
///
/// ```
/// use promise_stage::{make_ready, Status};
/// let promise = make_ready((100, 200));
/// assert_eq!(promise.status(), Status::Fulfilled);
/// assert_eq!(promise.value(), Some((100, 200)));
/// ```
pub fn make_ready<T>(value: T) -> Promise<T> {
    let deferred = Deferred::new();
    deferred.set_value(value);
    deferred.promise()
}

/// A stage already rejected with `err`.
pub fn make_ready_error<T>(err: SharedError) -> Promise<T> {
    let deferred = Deferred::new();
    deferred.set_error(err);
    deferred.promise()
}

/// Like [`make_ready_error`], taking ownership of a concrete error.
pub fn make_error<T, E>(err: E) -> Promise<T>
where
    E: std::error::Error + 'static,
{
    make_ready_error(shared(err))
}
