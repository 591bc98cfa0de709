//! Lease-based distributed mutual exclusion for Rust services.
//!
//! Guarantees that at most one instance of a logical service holds an
//! exclusive owner role at a time, so only one instance performs a stateful,
//! non-idempotent long-running activity (consuming an event stream, polling
//! an upstream API, ...). Ownership is a time-bounded lease on a record in a
//! coordination store, kept alive by a background heartbeat and released on
//! graceful shutdown.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lease_lock::{LeaseLock, LockConfig, MongoLockStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoLockStore::connect(
//!         "mongodb://localhost:27017",
//!         "myservice",
//!         None,
//!     )
//!     .await?;
//!
//!     // SERVICE_ID, LOCK_LEASE_SECONDS, ... all optional with defaults.
//!     let lock = LeaseLock::new(store, LockConfig::from_env()).await?;
//!
//!     // Blocks per the configured policy: randomized backoff forever
//!     // (default), or fixed polling with a hard ceiling.
//!     lock.acquire_blocking().await?;
//!
//!     // Heartbeats in the background, releases on completion, SIGINT or
//!     // SIGTERM; terminates the process if the lease is ever lost.
//!     lock.run(async {
//!         // protected work: only one instance ever runs this at a time
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Failure model
//!
//! - Contention is not an error; it drives the configured retry policy.
//! - Transient store failures are retried at the heartbeat tick or
//!   acquisition poll granularity.
//! - A lost lease is fatal by design: the heartbeat loop terminates the
//!   process immediately rather than risk two owners. A supervisor is
//!   expected to restart the instance.
//! - Release is best-effort; an unreleased lease expires on its own.
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `lease-lock-core`: configuration, the lock state machine, the
//!   [`LockStore`] contract
//! - `lease-lock-mongo`: MongoDB backend
//!
//! For fine-grained control, depend on the individual crates instead.

pub use lease_lock_core::*;

pub use lease_lock_mongo::{LockDocument, MongoLockStore};
