//! Error types for lease lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
///
/// Contention (another instance holding an unexpired lease) is deliberately
/// not an error; it is reported as `Ok(false)` from the acquisition path and
/// drives the configured retry policy instead.
#[derive(Error, Debug)]
pub enum LockError {
    /// Active-wait acquisition exceeded the configured maximum wait.
    #[error("lock acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// The coordination store was unreachable at startup (ping failed or the
    /// expiry index could not be created). Fatal before any acquisition.
    #[error("coordination store unavailable: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The coordination store failed while executing an operation.
    #[error("coordination store error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The lease was lost while owned: a renewal matched zero records.
    /// Fatal by design; never retried.
    #[error("lease '{0}' was lost to another instance")]
    LeaseLost(String),

    /// The operation requires an acquired lock and this instance is not the
    /// current owner.
    #[error("lock is not held by this instance")]
    NotOwner,

    /// Invalid lock configuration.
    #[error("invalid lock configuration: {0}")]
    Config(String),
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
