//! Delivery failure policy.

use crate::observer::{LeaseId, Observer};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// What an independent variable does when an observer callback panics
/// during a delivery round.
///
/// The new value is stored before the round starts either way; the policy
/// only decides whether observers later in (depth, version) order still see
/// it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropagationPolicy {
    /// Unwind immediately. Observers not yet visited miss this update.
    #[default]
    Abort,
    /// Finish the round, then re-raise the first panic.
    DeliverRemaining,
}

impl PropagationPolicy {
    /// Delivers `value` to each target in order under this policy.
    pub(crate) fn deliver<T>(self, targets: &[(Arc<Observer<T>>, LeaseId)], value: &T) {
        match self {
            PropagationPolicy::Abort => {
                for (observer, lease) in targets {
                    observer.update(value, *lease);
                }
            }
            PropagationPolicy::DeliverRemaining => {
                let mut first_panic = None;
                for (observer, lease) in targets {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        observer.update(value, *lease);
                    }));
                    if let Err(payload) = result {
                        tracing::warn!(observer = ?observer.id(), "observer callback panicked, continuing delivery");
                        first_panic.get_or_insert(payload);
                    }
                }
                if let Some(payload) = first_panic {
                    panic::resume_unwind(payload);
                }
            }
        }
    }
}
