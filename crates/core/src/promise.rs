//! Single-assignment asynchronous results.
//!
//! A [`Promise`] is resolved exactly once, by [`complete`](Promise::complete),
//! [`fail`](Promise::fail) or [`cancel`](Promise::cancel). Holders can block
//! on it, poll it as a [`Future`], or register cleanup hooks that run when it
//! resolves.
//!
//! Dropping the last handle to an unresolved promise cancels it, so
//! cleanup hooks run even when every holder walks away.

use crate::error::{Error, Result};
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

type CancelFn = Box<dyn FnOnce(&Error) + Send>;
type DoneFn = Box<dyn FnOnce() + Send>;

struct State<T> {
    outcome: Option<Result<T>>,
    on_cancel: Vec<CancelFn>,
    when_done: Vec<DoneFn>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.outcome.is_some() {
            return;
        }
        let error = Error::cancelled("promise dropped");
        tracing::debug!(%error, "promise abandoned");
        for callback in core::mem::take(&mut state.on_cancel) {
            callback(&error);
        }
        for hook in core::mem::take(&mut state.when_done) {
            hook();
        }
    }
}

/// A thread-safe, single-assignment result container.
///
/// Clones share the same underlying result.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// A handle that does not keep a [`Promise`] alive.
pub struct WeakPromise<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Clone for WeakPromise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T> WeakPromise<T> {
    /// Returns the promise if some holder still has it.
    pub fn upgrade(&self) -> Option<Promise<T>> {
        self.shared.upgrade().map(|shared| Promise { shared })
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise<T> {
    /// Creates an unresolved promise.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    outcome: None,
                    on_cancel: Vec::new(),
                    when_done: Vec::new(),
                    wakers: Vec::new(),
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Resolves the promise with a value.
    ///
    /// Returns false if the promise was already resolved.
    pub fn complete(&self, value: T) -> bool {
        self.resolve(Ok(value), false)
    }

    /// Resolves the promise with an error.
    ///
    /// Returns false if the promise was already resolved.
    pub fn fail(&self, error: Error) -> bool {
        self.resolve(Err(error), false)
    }

    /// Abandons interest in the result.
    ///
    /// Resolves with [`Error::Cancelled`] and runs the `on_cancel` callbacks
    /// before the `when_done` hooks. Returns false if already resolved.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.resolve(Err(Error::cancelled(reason)), true)
    }

    /// Registers a callback run if the promise is cancelled.
    ///
    /// Runs immediately if the promise was already cancelled, and never if
    /// it resolved any other way.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.outcome.is_none() {
            state.on_cancel.push(Box::new(callback));
            return;
        }
        let cancelled = match &state.outcome {
            Some(Err(error)) if error.is_cancelled() => Some(error.clone()),
            _ => None,
        };
        drop(state);
        if let Some(error) = cancelled {
            callback(&error);
        }
    }

    /// Registers a cleanup hook run once the promise resolves.
    ///
    /// Runs immediately if the promise is already resolved.
    pub fn when_done<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.outcome.is_none() {
            state.when_done.push(Box::new(hook));
            return;
        }
        drop(state);
        hook();
    }

    /// Creates a handle that does not keep the promise alive.
    pub fn downgrade(&self) -> WeakPromise<T> {
        WeakPromise {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Returns true once the promise is resolved.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    fn resolve(&self, outcome: Result<T>, cancelled: bool) -> bool {
        let (on_cancel, when_done, wakers, error) = {
            let mut state = self.shared.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            let error = match &outcome {
                Err(error) if cancelled => Some(error.clone()),
                _ => None,
            };
            state.outcome = Some(outcome);
            (
                core::mem::take(&mut state.on_cancel),
                core::mem::take(&mut state.when_done),
                core::mem::take(&mut state.wakers),
                error,
            )
        };
        self.shared.ready.notify_all();

        if let Some(error) = error {
            tracing::debug!(%error, "promise cancelled");
            for callback in on_cancel {
                callback(&error);
            }
        }
        for hook in when_done {
            hook();
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl<T: Clone> Promise<T> {
    /// Returns the outcome if the promise is resolved.
    pub fn peek(&self) -> Option<Result<T>> {
        self.shared.state.lock().outcome.clone()
    }

    /// Blocks the calling thread until the promise resolves.
    pub fn wait(&self) -> Result<T> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            self.shared.ready.wait(&mut state);
        }
    }

    /// Blocks until the promise resolves or `timeout` elapses.
    ///
    /// Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return Some(outcome.clone());
            }
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                return state.outcome.clone();
            }
        }
    }
}

impl<T: Clone> Future for Promise<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let Some(outcome) = &state.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;
    use std::thread;

    struct CountingWake(AtomicUsize);

    impl Wake for CountingWake {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_complete_once() {
        let promise = Promise::new();
        assert!(!promise.is_done());
        assert!(promise.peek().is_none());

        assert!(promise.complete(7));
        assert!(!promise.complete(8));
        assert!(!promise.fail(Error::failed("late")));

        assert_eq!(promise.peek(), Some(Ok(7)));
        assert_eq!(promise.wait(), Ok(7));
    }

    #[test]
    fn test_fail() {
        let promise: Promise<i32> = Promise::new();
        assert!(promise.fail(Error::failed("boom")));
        assert_eq!(promise.wait(), Err(Error::failed("boom")));
    }

    #[test]
    fn test_cancel_runs_callbacks() {
        let promise: Promise<i32> = Promise::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        promise.on_cancel(move |err| o1.lock().push(format!("cancel:{}", err)));
        let o2 = order.clone();
        promise.when_done(move || o2.lock().push("done".to_string()));

        assert!(promise.cancel("shutdown"));
        assert!(!promise.cancel("again"));

        let order = order.lock();
        assert_eq!(order.len(), 2);
        assert!(order[0].starts_with("cancel:"));
        assert!(order[0].contains("shutdown"));
        assert_eq!(order[1], "done");
        assert_eq!(promise.peek(), Some(Err(Error::cancelled("shutdown"))));
    }

    #[test]
    fn test_on_cancel_skipped_on_complete() {
        let promise = Promise::new();
        let called = Arc::new(AtomicUsize::new(0));

        let c1 = called.clone();
        promise.on_cancel(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        promise.complete(1);

        let c2 = called.clone();
        promise.on_cancel(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_late_registration_runs_immediately() {
        let promise: Promise<i32> = Promise::new();
        promise.cancel("gone");

        let called = Arc::new(AtomicUsize::new(0));
        let c1 = called.clone();
        promise.when_done(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = called.clone();
        promise.on_cancel(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        assert_eq!(called.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_wait_across_threads() {
        let promise = Promise::new();
        let producer = promise.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.complete("ready");
        });

        assert_eq!(promise.wait(), Ok("ready"));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout() {
        let promise: Promise<u8> = Promise::new();
        assert!(promise.wait_timeout(Duration::from_millis(5)).is_none());

        promise.complete(3);
        assert_eq!(promise.wait_timeout(Duration::from_millis(5)), Some(Ok(3)));
    }

    #[test]
    fn test_dropping_last_handle_cancels() {
        let promise: Promise<i32> = Promise::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        promise.on_cancel(move |err| o1.lock().push(format!("cancel:{}", err)));
        let o2 = order.clone();
        promise.when_done(move || o2.lock().push("done".to_string()));

        let weak = promise.downgrade();
        let other = promise.clone();
        drop(promise);
        // Another holder keeps it pending
        assert!(order.lock().is_empty());
        assert!(weak.upgrade().is_some());

        drop(other);
        assert!(weak.upgrade().is_none());
        let order = order.lock();
        assert_eq!(order.len(), 2);
        assert!(order[0].contains("promise dropped"));
        assert_eq!(order[1], "done");
    }

    #[test]
    fn test_dropping_resolved_promise_runs_nothing() {
        let promise = Promise::new();
        let called = Arc::new(AtomicUsize::new(0));
        let c1 = called.clone();
        promise.when_done(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        });

        promise.complete(1);
        drop(promise);
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_future_poll() {
        let wake = Arc::new(CountingWake(AtomicUsize::new(0)));
        let waker = Waker::from(wake.clone());
        let mut cx = Context::from_waker(&waker);

        let mut promise = Promise::new();
        assert!(Pin::new(&mut promise).poll(&mut cx).is_pending());
        // Polling again with the same waker does not register it twice
        assert!(Pin::new(&mut promise).poll(&mut cx).is_pending());

        promise.complete(42);
        assert_eq!(wake.0.load(Ordering::SeqCst), 1);
        assert_eq!(Pin::new(&mut promise).poll(&mut cx), Poll::Ready(Ok(42)));
    }
}
