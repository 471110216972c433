//! The variable abstraction.
//!
//! Every kind of variable implements a single capability, [`Observable`]:
//! accept an observer at a given depth and hand back a release handle.
//! [`Var`] is the shared, type-erased handle consumers work with; the
//! combinators (`map`, `flat_map`, `collect`) and the read helpers
//! (`sample`, `observe_until`) are all built on that one method.

use crate::observer::{Depth, Observer};
use parking_lot::Mutex;
use reva_core::{Closable, Promise};
use std::sync::Arc;

/// The one capability every variable provides.
pub trait Observable<T>: Send + Sync {
    /// Registers `observer` at `depth`.
    ///
    /// Implementations must deliver the current value to `observer`
    /// synchronously before returning. Releasing the returned handle cancels
    /// the registration; releasing it twice is a no-op.
    fn observe_at(&self, depth: Depth, observer: &Arc<Observer<T>>) -> Closable;
}

/// A possibly-changing value of type `T`.
///
/// Cloning a `Var` creates a new handle to the **same** variable.
pub struct Var<T> {
    source: Arc<dyn Observable<T>>,
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T: 'static> Var<T> {
    /// Wraps an [`Observable`] implementation.
    pub fn from_observable<O>(observable: O) -> Self
    where
        O: Observable<T> + 'static,
    {
        Self {
            source: Arc::new(observable),
        }
    }

    /// Registers an existing observer at `depth`.
    #[inline]
    pub fn observe_at(&self, depth: Depth, observer: &Arc<Observer<T>>) -> Closable {
        self.source.observe_at(depth, observer)
    }

    /// Subscribes `callback` to this variable.
    ///
    /// The callback runs once with the current value before this returns,
    /// then again on every change until the handle is released.
    pub fn observe<F>(&self, callback: F) -> Closable
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observe_at(Depth::ROOT, &Observer::new(callback))
    }
}

impl<T: Clone + Send + Sync + 'static> Var<T> {
    /// Reads the current value by subscribing and releasing immediately.
    ///
    /// Returns `None` only if the underlying [`Observable`] failed to
    /// deliver synchronously.
    pub fn try_sample(&self) -> Option<T> {
        let slot = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let handle = self.observe(move |value: &T| {
            *slot_clone.lock() = Some(value.clone());
        });
        handle.release();
        let value = slot.lock().take();
        value
    }

    /// Reads the current value by subscribing and releasing immediately.
    ///
    /// # Panics
    ///
    /// Panics if the underlying [`Observable`] does not deliver a value
    /// synchronously from `observe_at`.
    pub fn sample(&self) -> T {
        self.try_sample()
            .expect("observable did not deliver its value synchronously")
    }

    /// Resolves with the first value satisfying `predicate`.
    ///
    /// Observation stops as soon as the promise resolves. Cancelling the
    /// promise, or dropping every handle to it, resolves it with the
    /// cancellation reason and releases the subscription.
    pub fn observe_until<P>(&self, predicate: P) -> Promise<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let promise = Promise::new();
        // Weak so the subscription does not keep an abandoned promise alive
        let target = promise.downgrade();
        let handle = self.observe(move |value: &T| {
            let Some(target) = target.upgrade() else {
                return;
            };
            if !target.is_done() && predicate(value) {
                target.complete(value.clone());
            }
        });
        promise.when_done(move || handle.release());
        promise
    }
}

impl<T, O> From<Arc<O>> for Var<T>
where
    O: Observable<T> + 'static,
{
    fn from(observable: Arc<O>) -> Self {
        Self { source: observable }
    }
}
