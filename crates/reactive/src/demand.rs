//! Demand-driven variables.
//!
//! A demand-driven variable runs its producer only while somebody is
//! watching. The first observer starts the producer against a fresh
//! [`Independent`] seeded with the `empty` placeholder; later observers
//! share it; the last release stops the producer. The next observer after
//! that starts a brand-new activation.
//!
//! # Invariants
//!
//! 1. The reference count is positive iff the state is `Observing`.
//! 2. The producer is started exactly once per Idle -> Observing transition
//!    and stopped exactly once when the count returns to zero.
//! 3. The producer runs before the first observer subscribes, so it can fill
//!    the variable before the observer sees anything.
//! 4. Writes from a stopped producer land in an inner variable nobody
//!    observes any more.

use crate::independent::Independent;
use crate::observer::{Depth, Observer};
use crate::policy::PropagationPolicy;
use crate::var::{Observable, Var};
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use reva_core::Closable;
use std::sync::Arc;

type Producer<T> = Arc<dyn Fn(Independent<T>) -> Closable + Send + Sync>;

enum Demand<T> {
    Idle,
    Observing {
        refs: usize,
        activation: u64,
        var: Independent<T>,
        stop: Closable,
    },
}

struct DemandDriven<T> {
    empty: T,
    policy: PropagationPolicy,
    producer: Producer<T>,
    state: Arc<Mutex<Demand<T>>>,
    activations: AtomicU64,
}

impl<T> DemandDriven<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Joins the current activation, starting one if idle.
    fn acquire(&self) -> (Independent<T>, u64) {
        let mut state = self.state.lock();
        if let Demand::Observing {
            refs,
            activation,
            var,
            ..
        } = &mut *state
        {
            *refs += 1;
            return (var.clone(), *activation);
        }

        let activation = self.activations.fetch_add(1, Ordering::Relaxed) + 1;
        let var = Independent::with_policy(self.empty.clone(), self.policy);
        let stop = (self.producer)(var.clone());
        tracing::debug!(activation, "demand-driven producer started");
        *state = Demand::Observing {
            refs: 1,
            activation,
            var: var.clone(),
            stop,
        };
        (var, activation)
    }
}

/// Leaves `activation`, stopping the producer if this was the last observer.
fn leave<T>(state: &Mutex<Demand<T>>, activation: u64) {
    let stop = {
        let mut state = state.lock();
        let last = match &mut *state {
            Demand::Observing {
                refs,
                activation: current,
                ..
            } if *current == activation => {
                *refs -= 1;
                *refs == 0
            }
            _ => false,
        };
        if !last {
            return;
        }
        match core::mem::replace(&mut *state, Demand::Idle) {
            Demand::Observing { stop, .. } => stop,
            Demand::Idle => return,
        }
    };
    tracing::debug!(activation, "demand-driven producer stopped");
    stop.release();
}

impl<T> Observable<T> for DemandDriven<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn observe_at(&self, depth: Depth, observer: &Arc<Observer<T>>) -> Closable {
        let (var, activation) = self.acquire();
        let subscription = var.observe_at(depth, observer);
        let state = Arc::clone(&self.state);
        Closable::new(move || {
            subscription.release();
            leave(&state, activation);
        })
    }
}

impl<T> Var<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a variable produced on demand.
    ///
    /// `producer` is called with a fresh variable holding `empty` whenever
    /// the first observer arrives, and may write to it at any time. The
    /// returned handle is released when the last observer leaves.
    pub fn demand_driven<F>(empty: T, producer: F) -> Self
    where
        F: Fn(Independent<T>) -> Closable + Send + Sync + 'static,
    {
        Self::demand_driven_with_policy(empty, PropagationPolicy::default(), producer)
    }

    /// Like [`Var::demand_driven`], with a failure policy for the inner
    /// variable of every activation.
    pub fn demand_driven_with_policy<F>(empty: T, policy: PropagationPolicy, producer: F) -> Self
    where
        F: Fn(Independent<T>) -> Closable + Send + Sync + 'static,
    {
        Var::from_observable(DemandDriven {
            empty,
            policy,
            producer: Arc::new(producer),
            state: Arc::new(Mutex::new(Demand::Idle)),
            activations: AtomicU64::new(0),
        })
    }
}
