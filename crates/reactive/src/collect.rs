//! Aggregation of many variables into one.
//!
//! [`collect_into`] combines a fixed sequence of variables into a variable
//! holding the collection of their current values, in input order. It is a
//! demand-driven variable: input subscriptions exist only while the output
//! is observed.
//!
//! On activation every input delivers its initial value synchronously. No
//! output is published until every slot has been filled; after that the
//! full collection is republished on every per-slot change.

use crate::independent::Independent;
use crate::var::Var;
use parking_lot::ReentrantMutex;
use reva_core::Closable;
use std::cell::RefCell;
use std::sync::Arc;

struct Gather<T> {
    values: Vec<Option<T>>,
    /// Slots still waiting for their first value.
    pending: usize,
}

impl<T: Clone> Gather<T> {
    fn new(len: usize) -> Self {
        Self {
            values: vec![None; len],
            pending: len,
        }
    }

    /// Stores `value` in `slot`; returns true once every slot is filled.
    fn fill(&mut self, slot: usize, value: T) -> bool {
        if self.values[slot].replace(value).is_none() {
            self.pending -= 1;
        }
        self.pending == 0
    }

    fn assemble<C: FromIterator<T>>(&self) -> C {
        self.values.iter().flatten().cloned().collect()
    }
}

/// Combines `vars` into a variable of the collection of their values.
///
/// The target collection `C` is built with [`FromIterator`], preserving
/// input order. Before the first observer arrives the output holds the
/// empty collection.
pub fn collect_into<T, C, I>(vars: I) -> Var<C>
where
    T: Clone + Send + Sync + 'static,
    C: FromIterator<T> + Clone + PartialEq + Send + Sync + 'static,
    I: IntoIterator<Item = Var<T>>,
{
    let vars: Arc<[Var<T>]> = vars.into_iter().collect();
    let empty: C = core::iter::empty().collect();

    Var::demand_driven(empty, move |out: Independent<C>| {
        // Held across the publish so concurrent slot updates cannot
        // overwrite a newer collection with an older one.
        let gather = Arc::new(ReentrantMutex::new(RefCell::new(Gather::new(vars.len()))));
        let handles: Vec<Closable> = vars
            .iter()
            .enumerate()
            .map(|(slot, var)| {
                let gather = Arc::clone(&gather);
                let out = out.clone();
                var.observe(move |value: &T| {
                    let guard = gather.lock();
                    let assembled = {
                        let mut gather = guard.borrow_mut();
                        if !gather.fill(slot, value.clone()) {
                            return;
                        }
                        gather.assemble::<C>()
                    };
                    out.set(assembled);
                })
            })
            .collect();
        Closable::all(handles)
    })
}

impl<T> Var<Vec<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Combines `vars` into a variable of the vector of their values.
    pub fn collect<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = Var<T>>,
    {
        collect_into(vars)
    }
}
