//! Independent (mutable) variables.
//!
//! An [`Independent`] variable holds a current value and an ordered set of
//! leased observers. Writing a different value pushes it to every observer
//! synchronously, on the writing thread, in ascending (depth, version)
//! order.
//!
//! # Invariants
//!
//! 1. The observer set never holds two entries for the same observer.
//!    Re-registering an observer replaces its stale entry with a fresh one
//!    at a new version.
//! 2. Writing a value equal to the current one is a no-op.
//! 3. Observers at the same depth are notified in registration order;
//!    shallower observers are notified before deeper ones.
//! 4. A panicking observer never corrupts the variable: the value is stored
//!    and the observer set snapshotted before any callback runs.

use crate::observer::{Depth, LeaseId, Observer, ObserverId};
use crate::policy::PropagationPolicy;
use crate::var::{Observable, Var};
use core::fmt;
use hashbrown::HashMap;
use parking_lot::ReentrantMutex;
use reva_core::Closable;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordering key of a registration: depth first, then insertion version.
type EntryKey = (Depth, u64);

struct Entry<T> {
    observer: Arc<Observer<T>>,
    lease: LeaseId,
}

struct State<T> {
    value: T,
    /// Number of accepted writes.
    revision: u64,
    /// Source of registration versions.
    next_version: u64,
    observers: BTreeMap<EntryKey, Entry<T>>,
    index: HashMap<ObserverId, EntryKey>,
}

struct Shared<T> {
    policy: PropagationPolicy,
    /// Reentrant so callbacks running under delivery may read, observe or
    /// release on the same variable.
    state: ReentrantMutex<RefCell<State<T>>>,
}

impl<T> Shared<T> {
    fn unregister(&self, key: EntryKey, lease: LeaseId) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let current = state.observers.get(&key).is_some_and(|entry| entry.lease == lease);
        if !current {
            return;
        }
        if let Some(entry) = state.observers.remove(&key) {
            let id = entry.observer.id();
            if state.index.get(&id) == Some(&key) {
                state.index.remove(&id);
            }
        }
    }
}

/// A mutable variable: the root of every dependency graph.
///
/// Cloning an `Independent` creates a new handle to the **same** variable.
pub struct Independent<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Independent<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Independent<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a variable holding `initial` with the default policy.
    pub fn new(initial: T) -> Self {
        Self::with_policy(initial, PropagationPolicy::default())
    }

    /// Creates a variable holding `initial` with the given failure policy.
    pub fn with_policy(initial: T, policy: PropagationPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                policy,
                state: ReentrantMutex::new(RefCell::new(State {
                    value: initial,
                    revision: 0,
                    next_version: 0,
                    observers: BTreeMap::new(),
                    index: HashMap::new(),
                })),
            }),
        }
    }

    /// Returns the current value without subscribing.
    pub fn get(&self) -> T {
        let guard = self.shared.state.lock();
        let value = guard.borrow().value.clone();
        value
    }

    /// Stores `value` and delivers it to every observer.
    ///
    /// Returns false, and notifies nobody, if `value` equals the current
    /// value. Callback panics unwind to the caller according to the
    /// variable's [`PropagationPolicy`].
    pub fn set(&self, value: T) -> bool {
        let guard = self.shared.state.lock();
        let targets: Vec<(Arc<Observer<T>>, LeaseId)> = {
            let mut state = guard.borrow_mut();
            if state.value == value {
                return false;
            }
            state.value = value.clone();
            state.revision += 1;
            state
                .observers
                .values()
                .map(|entry| (Arc::clone(&entry.observer), entry.lease))
                .collect()
        };
        self.shared.policy.deliver(&targets, &value);
        drop(guard);
        true
    }

    /// Replaces the value with `f(current)` atomically with respect to
    /// other writers.
    pub fn update_with<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let guard = self.shared.state.lock();
        let current = guard.borrow().value.clone();
        let changed = self.set(f(&current));
        drop(guard);
        changed
    }

    /// Returns the number of accepted (value-changing) writes.
    pub fn revision(&self) -> u64 {
        let guard = self.shared.state.lock();
        let revision = guard.borrow().revision;
        revision
    }

    /// Returns the number of registered observers.
    pub fn observer_count(&self) -> usize {
        let guard = self.shared.state.lock();
        let count = guard.borrow().observers.len();
        count
    }

    /// Returns the failure policy.
    #[inline]
    pub fn policy(&self) -> PropagationPolicy {
        self.shared.policy
    }

    /// Returns a read-only [`Var`] handle to this variable.
    pub fn var(&self) -> Var<T> {
        Var::from_observable(self.clone())
    }
}

impl<T> Observable<T> for Independent<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn observe_at(&self, depth: Depth, observer: &Arc<Observer<T>>) -> Closable {
        // A fresh lease always changes the owner, so the value is delivered
        // on every registration
        let lease = LeaseId::next();
        let guard = self.shared.state.lock();
        observer.lease(lease);
        let (key, value) = {
            let mut state = guard.borrow_mut();
            if let Some(stale) = state.index.remove(&observer.id()) {
                state.observers.remove(&stale);
                tracing::trace!(observer = ?observer.id(), ?lease, "replaced stale registration");
            }
            state.next_version += 1;
            let key = (depth, state.next_version);
            state.observers.insert(
                key,
                Entry {
                    observer: Arc::clone(observer),
                    lease,
                },
            );
            state.index.insert(observer.id(), key);
            (key, state.value.clone())
        };
        observer.update(&value, lease);
        drop(guard);

        let shared = Arc::clone(&self.shared);
        let observer = Arc::clone(observer);
        Closable::new(move || {
            shared.unregister(key, lease);
            observer.relinquish(lease);
        })
    }
}

impl<T> From<Independent<T>> for Var<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(independent: Independent<T>) -> Self {
        Var::from_observable(independent)
    }
}

impl<T: fmt::Debug> fmt::Debug for Independent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.shared.state.lock();
        let state = guard.borrow();
        f.debug_struct("Independent")
            .field("value", &state.value)
            .field("revision", &state.revision)
            .field("observers", &state.observers.len())
            .finish()
    }
}
