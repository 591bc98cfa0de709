//! Store-agnostic core of the lease-based distributed lock.
//!
//! [`LeaseLock`] guarantees that at most one instance of a logical service
//! holds an exclusive owner role at a time, backed by any store implementing
//! the [`LockStore`] contract (atomic conditional writes plus record-level
//! expiry).

pub mod config;
pub mod error;
pub mod lock;
pub mod shutdown;
pub mod store;

pub use config::LockConfig;
pub use error::{LockError, LockResult};
pub use lock::LeaseLock;
pub use shutdown::{ExitHandler, ProcessExit, shutdown_signal};
pub use store::{ClaimOutcome, InsertOutcome, LeaseClaim, LockStore, RenewOutcome};
