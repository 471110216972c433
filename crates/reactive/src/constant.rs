//! Constant variables.

use crate::observer::{Depth, LeaseId, Observer, ObserverId};
use crate::var::{Observable, Var};
use hashbrown::HashMap;
use parking_lot::Mutex;
use reva_core::Closable;
use std::sync::Arc;

/// A variable whose value never changes.
///
/// Each observer receives the value exactly once, synchronously. The
/// observer is leased under a fresh identity first, which silences any
/// producer it is being rewired away from.
pub struct Constant<T> {
    value: T,
    registrations: Arc<Mutex<HashMap<LeaseId, ObserverId>>>,
}

impl<T> Constant<T> {
    /// Creates a constant holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value,
            registrations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the fixed value.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the number of registrations not yet released.
    pub fn registration_count(&self) -> usize {
        self.registrations.lock().len()
    }
}

impl<T> Observable<T> for Constant<T>
where
    T: Send + Sync + 'static,
{
    fn observe_at(&self, _depth: Depth, observer: &Arc<Observer<T>>) -> Closable {
        let lease = LeaseId::next();
        observer.lease(lease);
        self.registrations.lock().insert(lease, observer.id());
        observer.notify(&self.value);

        let registrations = Arc::clone(&self.registrations);
        let observer = Arc::clone(observer);
        Closable::new(move || {
            registrations.lock().remove(&lease);
            observer.relinquish(lease);
        })
    }
}

impl<T: Send + Sync + 'static> Var<T> {
    /// Creates a variable that always holds `value`.
    pub fn constant(value: T) -> Self {
        Var::from_observable(Constant::new(value))
    }
}
