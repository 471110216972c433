//! Scoped cancellation handles.
//!
//! A [`Closable`] wraps a release action that runs at most once. Every
//! subscription in Reva hands one back; releasing it tears the subscription
//! down. Handles can be sequenced with [`Closable::then`] and combined with
//! [`Closable::all`].

use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// An idempotent, thread-safe release handle.
///
/// Clones share the same release action, so releasing any clone releases
/// them all.
#[derive(Clone)]
pub struct Closable {
    action: Arc<Mutex<Option<ReleaseFn>>>,
}

impl Closable {
    /// Creates a handle that runs `action` on first release.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    /// Creates a handle that is already released.
    pub fn noop() -> Self {
        Self {
            action: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs the release action if it has not run yet.
    ///
    /// The action runs outside the handle's lock, so it may itself release
    /// other handles or re-enter this one.
    pub fn release(&self) {
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Returns true once the release action has been taken.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.action.lock().is_none()
    }

    /// Returns a handle that releases `self` and then `next`.
    pub fn then(self, next: Closable) -> Closable {
        Closable::new(move || {
            self.release();
            next.release();
        })
    }

    /// Returns a handle that releases every handle in iteration order.
    pub fn all<I>(handles: I) -> Closable
    where
        I: IntoIterator<Item = Closable>,
    {
        let handles: Vec<Closable> = handles.into_iter().collect();
        Closable::new(move || {
            for handle in &handles {
                handle.release();
            }
        })
    }

    /// Wraps this handle in a guard that releases it on drop.
    pub fn guard(self) -> ClosableGuard {
        ClosableGuard {
            handle: Some(self),
        }
    }
}

impl Default for Closable {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Closable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closable")
            .field("released", &self.is_released())
            .finish()
    }
}

/// RAII guard releasing its [`Closable`] when dropped.
#[derive(Debug)]
#[must_use = "dropping the guard releases the subscription immediately"]
pub struct ClosableGuard {
    handle: Option<Closable>,
}

impl ClosableGuard {
    /// Returns the handle without releasing it.
    pub fn disarm(mut self) -> Closable {
        self.handle.take().unwrap_or_default()
    }
}

impl Drop for ClosableGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
    }
}
