//! In-memory coordination store for exercising the lock state machine.
//!
//! Models the store contract faithfully: conditional claim, collision-failing
//! insert, owner-scoped renew/delete. Fault injection simulates outages, and
//! `force_takeover` simulates a competitor winning after lease expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use lease_lock::{
    ClaimOutcome, ExitHandler, InsertOutcome, LeaseClaim, LockError, LockResult, LockStore,
    RenewOutcome,
};

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub owner: String,
    pub host: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// `None` models a legacy record written without an expiry field.
    pub expires_at: Option<SystemTime>,
}

#[derive(Default)]
pub struct MockLockStore {
    records: Mutex<HashMap<String, StoredRecord>>,
    failing: AtomicBool,
    renew_failing: AtomicBool,
    delete_attempts: AtomicUsize,
}

impl MockLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes only renewals fail, simulating an owner whose store connection
    /// dropped while competitors remain unaffected.
    pub fn set_renew_failing(&self, failing: bool) {
        self.renew_failing.store(failing, Ordering::SeqCst);
    }

    pub fn record(&self, name: &str) -> Option<StoredRecord> {
        self.records.lock().unwrap().get(name).cloned()
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    /// Seeds a record with no expiry field, as an older schema would have
    /// written it.
    pub fn seed_legacy(&self, name: &str, owner: &str) {
        let now = SystemTime::now();
        self.records.lock().unwrap().insert(
            name.to_string(),
            StoredRecord {
                owner: owner.to_string(),
                host: "legacy-host".to_string(),
                created_at: now,
                updated_at: now,
                expires_at: None,
            },
        );
    }

    /// Rewrites the record as if another instance claimed it.
    pub fn force_takeover(&self, name: &str, owner: &str) {
        let now = SystemTime::now();
        self.records.lock().unwrap().insert(
            name.to_string(),
            StoredRecord {
                owner: owner.to_string(),
                host: "intruder-host".to_string(),
                created_at: now,
                updated_at: now,
                expires_at: Some(now + Duration::from_secs(3600)),
            },
        );
    }

    fn check_failing(&self) -> LockResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(LockError::Backend(Box::new(std::io::Error::other(
                "injected store outage",
            ))))
        } else {
            Ok(())
        }
    }
}

impl LockStore for MockLockStore {
    async fn prepare(&self) -> LockResult<()> {
        self.check_failing().map_err(|_| {
            LockError::Connection(Box::new(std::io::Error::other("injected store outage")))
        })
    }

    async fn claim(&self, claim: &LeaseClaim) -> LockResult<ClaimOutcome> {
        self.check_failing()?;
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&claim.name) {
            Some(record) => {
                let claimable = record.expires_at.is_none_or(|e| e <= claim.now)
                    || record.owner == claim.owner;
                if claimable {
                    record.owner = claim.owner.clone();
                    record.host = claim.host.clone();
                    record.updated_at = claim.now;
                    record.expires_at = Some(claim.expires_at);
                    Ok(ClaimOutcome::Claimed)
                } else {
                    Ok(ClaimOutcome::Held)
                }
            }
            None => Ok(ClaimOutcome::Held),
        }
    }

    async fn insert(&self, claim: &LeaseClaim) -> LockResult<InsertOutcome> {
        self.check_failing()?;
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&claim.name) {
            return Ok(InsertOutcome::AlreadyHeld);
        }
        records.insert(
            claim.name.clone(),
            StoredRecord {
                owner: claim.owner.clone(),
                host: claim.host.clone(),
                created_at: claim.now,
                updated_at: claim.now,
                expires_at: Some(claim.expires_at),
            },
        );
        Ok(InsertOutcome::Created)
    }

    async fn renew(
        &self,
        name: &str,
        owner: &str,
        now: SystemTime,
        expires_at: SystemTime,
    ) -> LockResult<RenewOutcome> {
        self.check_failing()?;
        if self.renew_failing.load(Ordering::SeqCst) {
            return Err(LockError::Backend(Box::new(std::io::Error::other(
                "injected renew outage",
            ))));
        }
        let mut records = self.records.lock().unwrap();
        match records.get_mut(name) {
            Some(record) if record.owner == owner => {
                record.updated_at = now;
                record.expires_at = Some(expires_at);
                Ok(RenewOutcome::Renewed)
            }
            _ => Ok(RenewOutcome::Lost),
        }
    }

    async fn delete_owned(&self, name: &str, owner: &str) -> LockResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let mut records = self.records.lock().unwrap();
        if records.get(name).is_some_and(|r| r.owner == owner) {
            records.remove(name);
        }
        Ok(())
    }
}

/// Exit handler that records invocations instead of killing the process.
#[derive(Default)]
pub struct MockExit {
    calls: AtomicUsize,
    last_code: AtomicI32,
}

impl MockExit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_code(&self) -> i32 {
        self.last_code.load(Ordering::SeqCst)
    }
}

impl ExitHandler for MockExit {
    fn exit(&self, code: i32) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_code.store(code, Ordering::SeqCst);
    }
}
