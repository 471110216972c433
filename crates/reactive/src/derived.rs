//! Derived variables.
//!
//! [`Var::flat_map`] builds a variable whose value is that of `f(source)`.
//! Every time the source changes a fresh inner variable is computed and the
//! downstream observer is moved onto it: the new inner subscription is made
//! first, swapped into the slot, and only then is the previous one released.
//! The new registration leases the observer before the old one
//! relinquishes it, so the observer is never left without an owner.
//!
//! A derived variable keeps no state of its own between subscriptions.

use crate::observer::{Depth, Observer};
use crate::var::{Observable, Var};
use parking_lot::Mutex;
use reva_core::Closable;
use std::sync::Arc;

type Derive<S, T> = Arc<dyn Fn(&S) -> Var<T> + Send + Sync>;

struct FlatMap<S, T> {
    source: Var<S>,
    derive: Derive<S, T>,
}

impl<S, T> Observable<T> for FlatMap<S, T>
where
    S: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn observe_at(&self, depth: Depth, observer: &Arc<Observer<T>>) -> Closable {
        // `None` once the subscription has been released
        let slot: Arc<Mutex<Option<Closable>>> = Arc::new(Mutex::new(Some(Closable::noop())));

        let rewire = {
            let slot = Arc::clone(&slot);
            let derive = Arc::clone(&self.derive);
            let observer = Arc::clone(observer);
            Observer::new(move |value: &S| {
                let next = derive(value).observe_at(depth.next(), &observer);
                let previous = {
                    let mut current = slot.lock();
                    match current.as_mut() {
                        Some(handle) => Some(core::mem::replace(handle, next.clone())),
                        None => None,
                    }
                };
                match previous {
                    Some(previous) => {
                        tracing::trace!(observer = ?observer.id(), depth = depth.level(), "rewired derived variable");
                        previous.release();
                    }
                    // Released concurrently; do not leak the fresh inner subscription
                    None => next.release(),
                }
            })
        };

        let outer = self.source.observe_at(depth, &rewire);
        Closable::new(move || {
            outer.release();
            let inner = slot.lock().take();
            if let Some(inner) = inner {
                inner.release();
            }
        })
    }
}

impl<S: Send + Sync + 'static> Var<S> {
    /// Derives a variable that tracks `f` applied to the latest value.
    ///
    /// `f` is re-run on every change of `self`, and the derived variable
    /// then follows the freshly returned inner variable.
    pub fn flat_map<T, F>(&self, f: F) -> Var<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&S) -> Var<T> + Send + Sync + 'static,
    {
        Var::from_observable(FlatMap {
            source: self.clone(),
            derive: Arc::new(f),
        })
    }

    /// Derives a variable holding `f` applied to the latest value.
    ///
    /// Equivalent to `flat_map(|x| Var::constant(f(x)))`.
    pub fn map<T, F>(&self, f: F) -> Var<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        self.flat_map(move |value| Var::constant(f(value)))
    }
}
