//! Leased observers.
//!
//! An [`Observer`] wraps a change callback together with a single owner
//! slot. Producers claim the observer with [`Observer::lease`], deliver with
//! [`Observer::update`] under the same identity, and give it back with
//! [`Observer::relinquish`]. Deliveries from anyone but the current owner are
//! dropped, which is what lets a derived variable rewire an observer from one
//! inner variable to the next without double deliveries.

use core::cell::Cell;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::ReentrantMutex;
use std::sync::Arc;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Opaque identity a producer presents when leasing and updating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(u64);

impl LeaseId {
    /// Mints a process-unique lease identity.
    pub fn next() -> Self {
        LeaseId(next_token())
    }
}

/// Identity of an [`Observer`] instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Nesting level of a subscription below the root `observe` call.
///
/// Each derived-variable hop adds one. Only used to order observers of a
/// single independent variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Depth(u32);

impl Depth {
    /// Depth of a subscription made directly by a consumer.
    pub const ROOT: Depth = Depth(0);

    /// Depth one derived-variable hop further in.
    #[inline]
    pub fn next(self) -> Depth {
        Depth(self.0 + 1)
    }

    /// Returns the numeric level.
    #[inline]
    pub fn level(self) -> u32 {
        self.0
    }
}

/// Callback type for value notifications.
pub type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A change callback guarded by a single-owner lease.
///
/// The owner slot is locked for the whole of a delivery, so `lease` and
/// `relinquish` from another thread wait for an in-flight callback to
/// finish. The lock is reentrant: a callback may update, lease or
/// relinquish its own observer.
pub struct Observer<T> {
    id: ObserverId,
    callback: Callback<T>,
    owner: ReentrantMutex<Cell<Option<LeaseId>>>,
}

impl<T> Observer<T> {
    /// Creates an unowned observer around `callback`.
    pub fn new<F>(callback: F) -> Arc<Self>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Arc::new(Self {
            id: ObserverId(next_token()),
            callback: Box::new(callback),
            owner: ReentrantMutex::new(Cell::new(None)),
        })
    }

    /// Returns the observer's identity.
    #[inline]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Returns the current owner, if any.
    #[inline]
    pub fn owner(&self) -> Option<LeaseId> {
        self.owner.lock().get()
    }

    /// Installs `who` as owner unconditionally.
    ///
    /// Returns true if the owner changed. A caller receiving true must
    /// deliver its current value right away.
    pub fn lease(&self, who: LeaseId) -> bool {
        let owner = self.owner.lock();
        owner.replace(Some(who)) != Some(who)
    }

    /// Clears the owner if it is still `who`; otherwise does nothing.
    pub fn relinquish(&self, who: LeaseId) {
        let owner = self.owner.lock();
        if owner.get() == Some(who) {
            owner.set(None);
        }
    }

    /// Invokes the callback if `who` holds the lease.
    ///
    /// The ownership check and the callback run under the observer's lock.
    /// Returns whether the callback ran.
    pub fn update(&self, value: &T, who: LeaseId) -> bool {
        let owner = self.owner.lock();
        if owner.get() != Some(who) {
            return false;
        }
        (self.callback)(value);
        drop(owner);
        true
    }

    /// Invokes the callback regardless of ownership.
    pub(crate) fn notify(&self, value: &T) {
        let _owner = self.owner.lock();
        (self.callback)(value);
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("owner", &self.owner())
            .finish()
    }
}
