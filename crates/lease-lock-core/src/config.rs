//! Lock configuration and environment resolution.

use std::time::Duration;

use crate::error::{LockError, LockResult};

const DEFAULT_NAME: &str = "singleton";
const DEFAULT_LEASE_SECONDS: u64 = 60;
const DEFAULT_BACKOFF_MIN_SECONDS: u64 = 15;
const DEFAULT_BACKOFF_MAX_SECONDS: u64 = 45;
const MIN_LEASE_SECONDS: u64 = 5;
const MIN_HEARTBEAT_SECONDS: u64 = 5;
/// Heartbeat interval as a fraction of the lease when not set explicitly.
const HEARTBEAT_LEASE_FRACTION: f64 = 0.4;

/// Configuration for a [`LeaseLock`](crate::lock::LeaseLock).
///
/// The lease duration must exceed plausible clock skew plus one store
/// round-trip plus one heartbeat interval, or an active owner risks a
/// spurious zero-match renewal; the environment-resolution floors exist to
/// keep misconfigured deployments out of that regime.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Logical name of the protected resource; primary key in the store.
    pub name: String,
    /// Identity of this instance, used in every mutation's match condition.
    pub instance_id: String,
    /// Human-readable location hint, diagnostics only.
    pub host: String,
    /// Lease duration; the record is claimable once this much time has
    /// passed since the last renewal.
    pub lease: Duration,
    /// Interval between renewal attempts while owned.
    pub heartbeat_interval: Duration,
    /// `true` selects active-wait acquisition (fixed poll, bounded by
    /// `acquire_max_wait`); `false` selects passive-wait (randomized
    /// backoff, unbounded).
    pub wait_for_acquire: bool,
    /// Active-wait ceiling. `None` means poll without bound.
    pub acquire_max_wait: Option<Duration>,
    /// Poll interval used in active-wait mode.
    pub acquire_poll_interval: Duration,
    /// Passive-wait backoff window; each retry sleeps a duration sampled
    /// uniformly from `[backoff_min, backoff_max]`.
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl LockConfig {
    /// Configuration with defaults for the given lock name: 60s lease,
    /// 24s heartbeat, passive-wait with a 15-45s backoff window, identity
    /// derived from `hostname:pid`.
    pub fn new(name: impl Into<String>) -> Self {
        let hostname = local_hostname();
        Self {
            name: name.into(),
            instance_id: format!("{hostname}:{}", std::process::id()),
            host: hostname,
            lease: Duration::from_secs(DEFAULT_LEASE_SECONDS),
            heartbeat_interval: default_heartbeat(Duration::from_secs(DEFAULT_LEASE_SECONDS)),
            wait_for_acquire: false,
            acquire_max_wait: None,
            acquire_poll_interval: Duration::from_secs(1),
            backoff_min: Duration::from_secs(DEFAULT_BACKOFF_MIN_SECONDS),
            backoff_max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECONDS),
        }
    }

    /// Resolves configuration from the environment.
    ///
    /// All variables are optional:
    ///
    /// | variable | default |
    /// |---|---|
    /// | `SERVICE_ID` | `"singleton"` |
    /// | `INSTANCE_ID` | `hostname:pid` |
    /// | `SERVICE_NAME` | hostname |
    /// | `LOCK_LEASE_SECONDS` | 60 (floor 5) |
    /// | `LOCK_HEARTBEAT_INTERVAL` | 40% of lease (floor 5) |
    /// | `LOCK_WAIT_FOR_ACQUIRE` | false |
    /// | `LOCK_ACQUIRE_MAX_WAIT` | 0 = unbounded |
    /// | `LOCK_WAIT_MIN_SECONDS` | 15 (floor 1) |
    /// | `LOCK_WAIT_MAX_SECONDS` | 45 (floor 1, raised to min) |
    pub fn from_env() -> Self {
        let hostname = local_hostname();
        let name = env_string("SERVICE_ID").unwrap_or_else(|| DEFAULT_NAME.to_string());
        let instance_id = env_string("INSTANCE_ID")
            .unwrap_or_else(|| format!("{hostname}:{}", std::process::id()));
        let host = env_string("SERVICE_NAME").unwrap_or_else(|| hostname.clone());

        let lease_seconds = env_u64("LOCK_LEASE_SECONDS", DEFAULT_LEASE_SECONDS).max(MIN_LEASE_SECONDS);
        let lease = Duration::from_secs(lease_seconds);
        let heartbeat_interval = env_string("LOCK_HEARTBEAT_INTERVAL")
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(|s| Duration::from_secs(s.max(MIN_HEARTBEAT_SECONDS)))
            .unwrap_or_else(|| default_heartbeat(lease));

        let backoff_min = env_u64("LOCK_WAIT_MIN_SECONDS", DEFAULT_BACKOFF_MIN_SECONDS).max(1);
        let backoff_max = env_u64("LOCK_WAIT_MAX_SECONDS", DEFAULT_BACKOFF_MAX_SECONDS)
            .max(1)
            .max(backoff_min);

        let max_wait_seconds = env_u64("LOCK_ACQUIRE_MAX_WAIT", 0);

        Self {
            name,
            instance_id,
            host,
            lease,
            heartbeat_interval,
            wait_for_acquire: env_bool("LOCK_WAIT_FOR_ACQUIRE"),
            acquire_max_wait: (max_wait_seconds > 0).then(|| Duration::from_secs(max_wait_seconds)),
            acquire_poll_interval: Duration::from_secs(1),
            backoff_min: Duration::from_secs(backoff_min),
            backoff_max: Duration::from_secs(backoff_max),
        }
    }

    /// Checks structural validity; floors are not enforced here so callers
    /// (tests in particular) may use arbitrarily short durations.
    pub(crate) fn validate(&self) -> LockResult<()> {
        if self.name.is_empty() {
            return Err(LockError::Config("lock name must not be empty".into()));
        }
        if self.instance_id.is_empty() {
            return Err(LockError::Config("instance id must not be empty".into()));
        }
        if self.lease.is_zero() {
            return Err(LockError::Config("lease duration must be non-zero".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(LockError::Config("heartbeat interval must be non-zero".into()));
        }
        if self.backoff_min > self.backoff_max {
            return Err(LockError::Config(format!(
                "backoff window is inverted: {:?} > {:?}",
                self.backoff_min, self.backoff_max
            )));
        }
        Ok(())
    }
}

fn default_heartbeat(lease: Duration) -> Duration {
    let seconds = (lease.as_secs_f64() * HEARTBEAT_LEASE_FRACTION).round() as u64;
    Duration::from_secs(seconds.max(MIN_HEARTBEAT_SECONDS))
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_string(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str) -> bool {
    env_string(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
