use std::cell::RefCell;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::{Promise, SharedError};

/// Awaits the outcome of one stage.
///
/// Nothing drives the stage forward: the waiter only completes once the
/// stage was already settled or something else on this thread settles it.
///
/// The first poll registers one continuation pair on the stage, replacing any
/// `then`/`exception`/`finally` registered on the same promise before. A
/// waiter dropped before settlement leaves that pair registered until the
/// stage itself is reset or dropped.
///
/// # Examples
///
/// ```
/// use promise_stage::Deferred;
/// use futures::executor::block_on;
/// let (deferred, promise) = Deferred::<String>::pair();
/// deferred.set_value("Hi".into());
/// assert_eq!(block_on(async { promise.await }).unwrap(), "Hi");
/// ```
pub struct Waiter<T> {
    promise: Option<Promise<T>>,
    inner: Rc<RefCell<Inner<T>>>,
}

struct Inner<T> {
    value: Option<Result<T, SharedError>>,
    waker: Option<Waker>,
}

impl<T> Inner<T> {
    fn deliver(inner: &RefCell<Self>, value: Result<T, SharedError>) {
        let waker = {
            let mut inner = inner.borrow_mut();
            inner.value = Some(value);
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

impl<T: 'static> IntoFuture for Promise<T> {
    type Output = Result<T, SharedError>;
    type IntoFuture = Waiter<T>;

    fn into_future(self) -> Waiter<T> {
        Waiter {
            promise: Some(self),
            inner: Rc::new(RefCell::new(Inner {
                value: None,
                waker: None,
            })),
        }
    }
}

impl<T: 'static> Future for Waiter<T> {
    type Output = Result<T, SharedError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        {
            let mut inner = this.inner.borrow_mut();
            if let Some(value) = inner.value.take() {
                return Poll::Ready(value);
            }
            inner.waker = Some(cx.waker().clone());
        }
        // First poll: hook both sides. A settled stage dispatches right here.
        if let Some(promise) = this.promise.take() {
            let inner = this.inner.clone();
            promise
                .state()
                .register_settled(Box::new(move |outcome| Inner::deliver(&inner, outcome)));
            if let Some(value) = this.inner.borrow_mut().value.take() {
                return Poll::Ready(value);
            }
        }
        Poll::Pending
    }
}
