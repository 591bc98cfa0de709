//! Lease-based distributed mutual-exclusion lock.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::LockConfig;
use crate::error::{LockError, LockResult};
use crate::shutdown::{ExitHandler, ProcessExit, shutdown_signal};
use crate::store::{ClaimOutcome, InsertOutcome, LeaseClaim, LockStore, RenewOutcome};

/// Running heartbeat task plus the channel that stops it.
struct Heartbeat {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// A named lease on a shared coordination store.
///
/// At most one instance holds the lease for a given name at a time. The
/// intended flow:
///
/// ```rust,ignore
/// let lock = LeaseLock::new(store, LockConfig::from_env()).await?;
/// lock.acquire_blocking().await?;
/// lock.run(protected_work()).await?;
/// ```
///
/// [`run`](Self::run) starts the heartbeat, drives the protected work until
/// it finishes, a termination signal arrives, or the lease is lost, and then
/// releases the lock. Callers managing their own lifecycle can instead use
/// [`start_heartbeat`](Self::start_heartbeat) and [`release`](Self::release)
/// directly; `release` must run on every graceful shutdown path so a
/// successor does not have to wait out the full lease.
pub struct LeaseLock<S> {
    store: Arc<S>,
    cfg: LockConfig,
    owned: Arc<AtomicBool>,
    lost_tx: watch::Sender<bool>,
    lost_rx: watch::Receiver<bool>,
    heartbeat: std::sync::Mutex<Option<Heartbeat>>,
    exit: Arc<dyn ExitHandler>,
}

impl<S: LockStore + 'static> LeaseLock<S> {
    /// Creates the lock and verifies the store is usable.
    ///
    /// Runs the store's [`prepare`](LockStore::prepare) step (connectivity
    /// check, expiry-index bootstrap). A failure there is fatal: the service
    /// must not proceed without a working coordination store.
    pub async fn new(store: S, cfg: LockConfig) -> LockResult<Self> {
        cfg.validate()?;
        info!(
            lock = %cfg.name,
            owner = %cfg.instance_id,
            host = %cfg.host,
            lease = ?cfg.lease,
            heartbeat = ?cfg.heartbeat_interval,
            wait_for_acquire = cfg.wait_for_acquire,
            backoff_min = ?cfg.backoff_min,
            backoff_max = ?cfg.backoff_max,
            "lease lock configured"
        );

        let store = Arc::new(store);
        store.prepare().await?;

        let (lost_tx, lost_rx) = watch::channel(false);
        Ok(Self {
            store,
            cfg,
            owned: Arc::new(AtomicBool::new(false)),
            lost_tx,
            lost_rx,
            heartbeat: std::sync::Mutex::new(None),
            exit: Arc::new(ProcessExit),
        })
    }

    /// Replaces the exit handler invoked on lease loss and on an exhausted
    /// active-wait ceiling. Defaults to exiting the process.
    pub fn with_exit_handler(mut self, exit: Arc<dyn ExitHandler>) -> Self {
        self.exit = exit;
        self
    }

    /// Returns the logical name of this lock.
    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    /// Whether this instance currently believes it owns the lease.
    pub fn is_owner(&self) -> bool {
        self.owned.load(Ordering::SeqCst)
    }

    /// Receiver that flips to `true` when the heartbeat loop observes the
    /// lease lost to another instance.
    pub fn lost_token(&self) -> watch::Receiver<bool> {
        self.lost_rx.clone()
    }

    /// Single non-blocking acquisition attempt.
    ///
    /// Phase one is an atomic conditional update claiming an expired,
    /// same-owner, or uninitialized record; phase two falls back to an atomic
    /// insert whose uniqueness guarantee settles the initial-creation race.
    /// Losing that race is contention (`Ok(false)`), not an error. Store
    /// failures propagate; they are never absorbed at this layer.
    #[instrument(skip(self), fields(lock = %self.cfg.name, owner = %self.cfg.instance_id))]
    pub async fn try_acquire_once(&self) -> LockResult<bool> {
        let now = SystemTime::now();
        let claim = LeaseClaim {
            name: self.cfg.name.clone(),
            owner: self.cfg.instance_id.clone(),
            host: self.cfg.host.clone(),
            now,
            expires_at: now + self.cfg.lease,
        };

        if self.store.claim(&claim).await? == ClaimOutcome::Claimed {
            self.owned.store(true, Ordering::SeqCst);
            info!(lease = ?self.cfg.lease, "acquired lock");
            return Ok(true);
        }

        match self.store.insert(&claim).await? {
            InsertOutcome::Created => {
                self.owned.store(true, Ordering::SeqCst);
                info!(lease = ?self.cfg.lease, "acquired lock");
                Ok(true)
            }
            InsertOutcome::AlreadyHeld => {
                debug!("lock currently held by another instance");
                Ok(false)
            }
        }
    }

    /// Acquires the lock, blocking per the configured policy.
    ///
    /// Passive-wait (the default) retries forever, sleeping a duration
    /// sampled uniformly from the backoff window after each failed attempt.
    /// Active-wait polls on a fixed interval; once `acquire_max_wait`
    /// elapses it invokes the exit handler with status 0 so a supervising
    /// platform can retry the instance later, then returns
    /// [`LockError::Timeout`].
    #[instrument(skip(self), fields(lock = %self.cfg.name, owner = %self.cfg.instance_id))]
    pub async fn acquire_blocking(&self) -> LockResult<()> {
        let start = Instant::now();
        if self.cfg.wait_for_acquire {
            loop {
                if self.try_acquire_once().await? {
                    return Ok(());
                }
                if let Some(max_wait) = self.cfg.acquire_max_wait
                    && start.elapsed() > max_wait
                {
                    warn!(?max_wait, "lock acquisition timed out; exiting");
                    self.exit.exit(0);
                    return Err(LockError::Timeout(max_wait));
                }
                tokio::time::sleep(self.cfg.acquire_poll_interval).await;
            }
        } else {
            loop {
                if self.try_acquire_once().await? {
                    return Ok(());
                }
                let backoff = Duration::from_secs_f64(rand::rng().random_range(
                    self.cfg.backoff_min.as_secs_f64()..=self.cfg.backoff_max.as_secs_f64(),
                ));
                info!(?backoff, "lock held by another instance; waiting before retry");
                tokio::time::sleep(backoff).await;
            }
        }
    }

    /// Starts the background renewal loop. No-op unless this instance owns
    /// the lease; no-op if a loop is already running.
    pub fn start_heartbeat(&self) {
        if !self.is_owner() {
            return;
        }
        let mut slot = self.heartbeat.lock().expect("heartbeat mutex poisoned");
        if slot.as_ref().is_some_and(|hb| !hb.task.is_finished()) {
            return;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(heartbeat_loop(
            self.store.clone(),
            self.cfg.clone(),
            self.owned.clone(),
            stop_rx,
            self.lost_tx.clone(),
            self.exit.clone(),
        ));
        *slot = Some(Heartbeat { stop: stop_tx, task });
    }

    /// Runs `work` under ownership until told to stop.
    ///
    /// Starts the heartbeat, then waits for the first of: the work future
    /// completing, a termination signal, or the lease being lost. Releases
    /// the lock in every case. Lease loss is reported as
    /// [`LockError::LeaseLost`]; under the default exit handler the process
    /// is already terminating by then.
    pub async fn run<F>(&self, work: F) -> LockResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        if !self.is_owner() {
            return Err(LockError::NotOwner);
        }
        self.start_heartbeat();
        let mut lost = self.lost_token();
        let outcome = tokio::select! {
            _ = work => Ok(()),
            _ = shutdown_signal() => {
                info!(lock = %self.cfg.name, "termination signal received; releasing lock");
                Ok(())
            }
            _ = lost.changed() => Err(LockError::LeaseLost(self.cfg.name.clone())),
        };
        self.release().await;
        outcome
    }

    /// Releases the lock. Idempotent and best-effort: safe to call multiple
    /// times and from multiple shutdown paths; only the record still owned
    /// by this instance is ever deleted. Store errors are logged and
    /// swallowed because lease expiry is the ultimate backstop.
    #[instrument(skip(self), fields(lock = %self.cfg.name, owner = %self.cfg.instance_id))]
    pub async fn release(&self) {
        if !self.owned.swap(false, Ordering::SeqCst) {
            return;
        }
        let heartbeat = self.heartbeat.lock().expect("heartbeat mutex poisoned").take();
        if let Some(hb) = heartbeat {
            let _ = hb.stop.send(true);
        }
        match self
            .store
            .delete_owned(&self.cfg.name, &self.cfg.instance_id)
            .await
        {
            Ok(()) => info!("released lock"),
            Err(e) => warn!(error = %e, "failed to release lock; lease will expire on its own"),
        }
    }
}

/// Renewal loop: extend the lease or fail loudly.
///
/// A zero-match renewal means another instance may already be running the
/// protected work, so the loop publishes the loss and terminates the process
/// immediately, with no graceful drain. Transient store errors are tolerated
/// tick-to-tick; only a confirmed zero match is treated as loss.
async fn heartbeat_loop<S: LockStore>(
    store: Arc<S>,
    cfg: LockConfig,
    owned: Arc<AtomicBool>,
    mut stop: watch::Receiver<bool>,
    lost_tx: watch::Sender<bool>,
    exit: Arc<dyn ExitHandler>,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(cfg.heartbeat_interval) => {}
        }
        let now = SystemTime::now();
        let expires_at = now + cfg.lease;
        match store
            .renew(&cfg.name, &cfg.instance_id, now, expires_at)
            .await
        {
            Ok(RenewOutcome::Renewed) => {
                debug!(lock = %cfg.name, ?expires_at, "lease renewed");
            }
            Ok(RenewOutcome::Lost) => {
                owned.store(false, Ordering::SeqCst);
                error!(
                    lock = %cfg.name,
                    owner = %cfg.instance_id,
                    "lost distributed lock; terminating to avoid a duplicate owner"
                );
                let _ = lost_tx.send(true);
                exit.exit(0);
                break;
            }
            Err(e) => {
                warn!(
                    lock = %cfg.name,
                    error = %e,
                    "heartbeat renewal failed; retrying on next tick"
                );
            }
        }
    }
}
