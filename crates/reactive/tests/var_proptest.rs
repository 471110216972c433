//! Property-based tests for reactive variables.
//!
//! These tests check delivery counts, ordering and aggregation for randomly
//! generated write sequences.

use parking_lot::Mutex;
use proptest::prelude::*;
use reva_reactive::{Depth, Independent, Observable, Observer, Var};
use std::sync::Arc;

/// Small value range so that repeated (redundant) writes are common.
fn writes_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..4, 0..max_len)
}

proptest! {
    /// Property: an observer sees the initial value plus one delivery per
    /// write that actually changes the value.
    #[test]
    fn deliveries_match_value_changes(initial in 0u8..4, writes in writes_strategy(40)) {
        let v = Independent::new(initial);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _handle = v.var().observe(move |x| seen_clone.lock().push(*x));

        let mut expected = vec![initial];
        for &w in &writes {
            let changed = v.set(w);
            prop_assert_eq!(changed, *expected.last().unwrap() != w);
            if changed {
                expected.push(w);
            }
        }

        prop_assert_eq!(&*seen.lock(), &expected);
        prop_assert_eq!(v.revision() as usize, expected.len() - 1);
    }

    /// Property: delivery order is by depth, then registration order.
    #[test]
    fn delivery_follows_depth_then_registration(depths in prop::collection::vec(0u32..4, 1..20)) {
        let v = Independent::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = depths
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let mut depth = Depth::ROOT;
                for _ in 0..d {
                    depth = depth.next();
                }
                let log = log.clone();
                let observer = Observer::new(move |_: &i32| log.lock().push(i));
                v.observe_at(depth, &observer)
            })
            .collect();
        log.lock().clear();

        v.set(1);

        let mut expected: Vec<usize> = (0..depths.len()).collect();
        expected.sort_by_key(|&i| depths[i]);
        prop_assert_eq!(&*log.lock(), &expected);
        drop(handles);
    }

    /// Property: a chain of `n` maps equals applying the function `n` times.
    #[test]
    fn map_chain_tracks_source(n in 1usize..8, writes in prop::collection::vec(-100i64..100, 1..10)) {
        let v = Independent::new(0i64);
        let mut chain = v.var();
        for _ in 0..n {
            chain = chain.map(|x| x + 1);
        }

        let last = Arc::new(Mutex::new(None));
        let last_clone = last.clone();
        let handle = chain.observe(move |x| *last_clone.lock() = Some(*x));

        for &w in &writes {
            v.set(w);
            prop_assert_eq!(*last.lock(), Some(v.get() + n as i64));
        }

        handle.release();
        prop_assert_eq!(v.observer_count(), 0);
    }

    /// Property: the aggregated variable always republishes the latest value
    /// of every input.
    #[test]
    fn collect_tracks_inputs(
        initial in prop::collection::vec(0i32..10, 1..6),
        updates in prop::collection::vec((0usize..6, 0i32..10), 0..30),
    ) {
        let inputs: Vec<Independent<i32>> = initial.iter().map(|&x| Independent::new(x)).collect();
        let all = Var::collect(inputs.iter().map(|v| v.var()));

        let latest = Arc::new(Mutex::new(Vec::new()));
        let latest_clone = latest.clone();
        let _handle = all.observe(move |xs| *latest_clone.lock() = xs.clone());
        prop_assert_eq!(&*latest.lock(), &initial);

        for (slot, value) in updates {
            let slot = slot % inputs.len();
            inputs[slot].set(value);
            let current: Vec<i32> = inputs.iter().map(|v| v.get()).collect();
            prop_assert_eq!(&*latest.lock(), &current);
        }
    }
}
