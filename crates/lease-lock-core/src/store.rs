//! The coordination-store contract.
//!
//! The lock core depends only on this trait: a document store offering atomic
//! conditional update, atomic insert that fails on key collision, atomic
//! conditional delete, and automatic removal of records whose expiry has
//! elapsed. Store-side expiry is garbage collection only; the claim condition
//! treats an expired-but-not-yet-deleted record as claimable.

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::LockResult;

/// A single attempt to take (or re-take) ownership of a lock record.
#[derive(Debug, Clone)]
pub struct LeaseClaim {
    /// Logical lock name; the record's primary key.
    pub name: String,
    /// Identity the claimant will write into `owner`.
    pub owner: String,
    /// Diagnostics-only location hint.
    pub host: String,
    /// Claimant's view of the current time; also written to `updatedAt`.
    pub now: SystemTime,
    /// New lease boundary, `now + lease`.
    pub expires_at: SystemTime,
}

/// Outcome of the conditional-update claim path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Exactly one record matched and was rewritten; the claimant owns it.
    Claimed,
    /// No record matched: either none exists yet, or an unexpired lease is
    /// held by another owner.
    Held,
}

/// Outcome of the insert fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A fresh record was created; the claimant owns it.
    Created,
    /// A record with that key already exists: a competitor won the race
    /// between the update and insert phases. Contention, not an error.
    AlreadyHeld,
}

/// Outcome of a heartbeat renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewOutcome {
    /// The name+owner condition matched; the lease boundary was extended.
    Renewed,
    /// Zero records matched: ownership has passed to another instance.
    Lost,
}

/// Atomic operations the backing store must provide.
///
/// Every method is a single atomic store round-trip; the lock record is never
/// read-modify-written locally. Two concurrent instances are ordered relative
/// to each other only at these operations.
pub trait LockStore: Send + Sync {
    /// Startup readiness: connectivity check and expiry-index bootstrap.
    /// Failure is fatal and must surface before any acquisition attempt.
    fn prepare(&self) -> impl Future<Output = LockResult<()>> + Send;

    /// Atomic conditional update keyed by `claim.name`, matching any of:
    /// the record's expiry is at or before `claim.now`, the record's owner
    /// equals `claim.owner` (same-owner re-entrance), or the record has no
    /// expiry at all (uninitialized or legacy schema). On match, rewrite
    /// owner, host, updated-at, and expiry from the claim.
    fn claim(&self, claim: &LeaseClaim) -> impl Future<Output = LockResult<ClaimOutcome>> + Send;

    /// Atomic insert of a fresh record built from the claim. A key collision
    /// is reported as [`InsertOutcome::AlreadyHeld`], never as an error.
    fn insert(&self, claim: &LeaseClaim) -> impl Future<Output = LockResult<InsertOutcome>> + Send;

    /// Atomic conditional update matching `name` and `owner`, setting the
    /// expiry to `expires_at` and the updated-at field to `now`.
    fn renew(
        &self,
        name: &str,
        owner: &str,
        now: SystemTime,
        expires_at: SystemTime,
    ) -> impl Future<Output = LockResult<RenewOutcome>> + Send;

    /// Atomic conditional delete matching `name` and `owner`. Never deletes
    /// a record now owned by someone else.
    fn delete_owned(&self, name: &str, owner: &str) -> impl Future<Output = LockResult<()>> + Send;
}

impl<S: LockStore> LockStore for Arc<S> {
    fn prepare(&self) -> impl Future<Output = LockResult<()>> + Send {
        S::prepare(self)
    }

    fn claim(&self, claim: &LeaseClaim) -> impl Future<Output = LockResult<ClaimOutcome>> + Send {
        S::claim(self, claim)
    }

    fn insert(&self, claim: &LeaseClaim) -> impl Future<Output = LockResult<InsertOutcome>> + Send {
        S::insert(self, claim)
    }

    fn renew(
        &self,
        name: &str,
        owner: &str,
        now: SystemTime,
        expires_at: SystemTime,
    ) -> impl Future<Output = LockResult<RenewOutcome>> + Send {
        S::renew(self, name, owner, now, expires_at)
    }

    fn delete_owned(&self, name: &str, owner: &str) -> impl Future<Output = LockResult<()>> + Send {
        S::delete_owned(self, name, owner)
    }
}
