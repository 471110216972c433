//! Reva Reactive - Self-adjusting reactive variables.
//!
//! This crate implements variables whose values change over time, whose
//! changes propagate automatically to variables derived from them, and
//! which notify observers synchronously on change. There is no scheduler:
//! every propagation runs on the writing thread, inside the critical section
//! of the variable being written.
//!
//! # Core Concepts
//!
//! - `Observer`: A change callback guarded by a single-owner lease
//! - `Observable`: The one capability every variable has: accept an observer
//!   at a depth, return a release handle
//! - `Var`: A shared handle to any variable, with `map`, `flat_map`,
//!   `sample` and `observe_until`
//! - `Independent`: A mutable variable, the root of every dependency graph
//! - `Var::demand_driven`: A variable whose producer runs only while observed
//! - `Var::collect`: A variable of the values of many variables
//!
//! # Ordering
//!
//! Observers of one independent variable are notified by depth, then by
//! registration order. Depth grows by one per `flat_map` hop, so a derived
//! variable is always rewired before observers nested inside it hear about
//! the change. No ordering exists across independently written variables.
//!
//! # Failures
//!
//! A panicking observer callback unwinds to the writer. By default the
//! remaining observers of that write miss it; see [`PropagationPolicy`].
//!
//! # Example
//!
//! ```rust
//! use reva_reactive::{Independent, Var};
//!
//! let celsius = Independent::new(20.0_f64);
//! let fahrenheit = celsius.var().map(|c| c * 9.0 / 5.0 + 32.0);
//!
//! let handle = fahrenheit.observe(|f| println!("{f}°F"));
//! celsius.set(25.0);
//! handle.release();
//!
//! assert_eq!(fahrenheit.sample(), 77.0);
//!
//! let both = Var::collect(vec![celsius.var(), fahrenheit]);
//! assert_eq!(both.sample(), vec![25.0, 77.0]);
//! ```

pub mod collect;
pub mod constant;
pub mod demand;
pub mod derived;
pub mod independent;
pub mod observer;
pub mod policy;
pub mod var;

pub use collect::collect_into;
pub use constant::Constant;
pub use independent::Independent;
pub use observer::{Callback, Depth, LeaseId, Observer, ObserverId};
pub use policy::PropagationPolicy;
pub use var::{Observable, Var};

// Re-export the collaborator types that appear in this crate's signatures
pub use reva_core::{Closable, ClosableGuard, Error, Promise, Result};
