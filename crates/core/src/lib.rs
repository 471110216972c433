//! Reva Core - Collaborator abstractions for Reva reactive variables.
//!
//! This crate provides the pieces the variable core consumes but does not
//! own:
//!
//! - `Closable`: An idempotent, thread-safe cancellation handle, with
//!   sequencing (`then`), combination (`all`) and an RAII guard
//! - `Promise`: A single-assignment asynchronous result with cancellation
//!   callbacks, cleanup hooks, blocking waits and a `Future` impl
//! - `Error`: Error types surfaced through promises
//!
//! # Example
//!
//! ```rust
//! use reva_core::{Closable, Promise};
//!
//! let handle = Closable::new(|| println!("released"));
//! handle.release();
//! handle.release(); // no-op
//!
//! let promise = Promise::new();
//! promise.when_done(move || handle.release());
//! promise.complete(5);
//! assert_eq!(promise.wait(), Ok(5));
//! ```

mod closable;
mod error;
mod promise;

pub use closable::{Closable, ClosableGuard};
pub use error::{Error, Result};
pub use promise::{Promise, WeakPromise};
