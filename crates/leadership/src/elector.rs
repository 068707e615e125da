//! LeaderElector - lease acquire/renew loop
//!
//! Follows the usual Kubernetes election protocol: a candidate takes the
//! lease when it is absent, released, or not renewed for `lease_duration`
//! as measured on the local clock since the record last changed. The leader
//! renews every `retry_period` and gives up once `renew_deadline` has passed
//! without a successful renewal.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use contracts::LeaderElectionSettings;
use observability::metrics as obs;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{LeadershipError, Result};
use crate::lock::{LeaseLock, LeaseRecord};

/// Retry jitter, as a fraction of the retry period
const JITTER_FACTOR: f64 = 1.2;

/// Election timing and identity
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    pub identity: String,
    pub lease_duration: Duration,
    pub renew_deadline: Duration,
    pub retry_period: Duration,
    /// Clear the holder when stopping while leader
    pub release_on_cancel: bool,
}

impl ElectionConfig {
    pub fn new(identity: impl Into<String>) -> Self {
        Self::from_settings(identity, &LeaderElectionSettings::default())
    }

    pub fn from_settings(identity: impl Into<String>, settings: &LeaderElectionSettings) -> Self {
        Self {
            identity: identity.into(),
            lease_duration: settings.lease_duration(),
            renew_deadline: settings.renew_deadline(),
            retry_period: settings.retry_period(),
            release_on_cancel: true,
        }
    }

    /// `lease_duration > renew_deadline > retry_period * 1.2`
    pub fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(LeadershipError::invalid_config("identity must not be empty"));
        }
        if self.retry_period.is_zero() {
            return Err(LeadershipError::invalid_config("retry_period must be > 0"));
        }
        if self.lease_duration <= self.renew_deadline {
            return Err(LeadershipError::invalid_config(
                "lease_duration must be greater than renew_deadline",
            ));
        }
        if self.renew_deadline.as_secs_f64() <= self.retry_period.as_secs_f64() * JITTER_FACTOR {
            return Err(LeadershipError::invalid_config(
                "renew_deadline must be greater than retry_period * 1.2",
            ));
        }
        Ok(())
    }
}

/// How an election ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// Stop fired; the leading task (if any) finished first
    Cancelled,
    /// Renewal failed past the deadline; the leading task was aborted
    LeadershipLost,
    /// The leading task returned on its own
    LeaderExited,
}

/// One candidate in the election
pub struct LeaderElector<L> {
    lock: L,
    config: ElectionConfig,
    /// Last lease version seen and when it changed, on the local clock
    observed_version: Option<String>,
    observed_at: Instant,
}

impl<L: LeaseLock> LeaderElector<L> {
    pub fn new(lock: L, config: ElectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lock,
            config,
            observed_version: None,
            observed_at: Instant::now(),
        })
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    /// Campaign until leader, then run `on_started_leading` while renewing
    ///
    /// The leading task gets a child of `stop`; it is cancelled when stop
    /// fires and aborted when leadership is lost.
    #[instrument(name = "leader_election", skip_all, fields(identity = %self.config.identity))]
    pub async fn run<F, Fut>(mut self, stop: CancellationToken, on_started_leading: F) -> ElectionOutcome
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!(lock = %self.lock.describe(), "Attempting to acquire leader lease");
        if !self.acquire(&stop).await {
            return ElectionOutcome::Cancelled;
        }

        info!(lock = %self.lock.describe(), "Successfully acquired lease");
        obs::record_leader(&self.config.identity, true);
        obs::record_leader_transition(&self.config.identity);

        let leading = stop.child_token();
        let mut task = tokio::spawn(on_started_leading(leading.clone()));
        let outcome = self.renew(&stop, &mut task).await;
        leading.cancel();

        match outcome {
            ElectionOutcome::LeadershipLost => {
                task.abort();
                let _ = task.await;
                error!(lock = %self.lock.describe(), "Leader election lost");
            }
            ElectionOutcome::Cancelled => {
                if let Err(e) = task.await {
                    error!(error = %e, "Leading task failed");
                }
                if self.config.release_on_cancel {
                    self.release().await;
                }
            }
            ElectionOutcome::LeaderExited => {
                if self.config.release_on_cancel {
                    self.release().await;
                }
            }
        }
        obs::record_leader(&self.config.identity, false);
        outcome
    }

    /// Retry with jitter until acquired; false when stopped first
    async fn acquire(&mut self, stop: &CancellationToken) -> bool {
        loop {
            if stop.is_cancelled() {
                return false;
            }
            if self.try_acquire_or_renew().await {
                return true;
            }
            let wait = jitter(self.config.retry_period);
            tokio::select! {
                _ = stop.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Renew every retry period until stop, task exit or lost lease
    async fn renew(&mut self, stop: &CancellationToken, task: &mut JoinHandle<()>) -> ElectionOutcome {
        let mut deadline = Instant::now() + self.config.renew_deadline;
        loop {
            tokio::select! {
                _ = stop.cancelled() => return ElectionOutcome::Cancelled,
                result = &mut *task => {
                    if let Err(e) = result {
                        error!(error = %e, "Leading task failed");
                    }
                    info!("Leading task exited");
                    return ElectionOutcome::LeaderExited;
                }
                _ = tokio::time::sleep(self.config.retry_period) => {}
            }

            let renewed = tokio::select! {
                _ = stop.cancelled() => return ElectionOutcome::Cancelled,
                r = tokio::time::timeout_at(deadline, self.try_acquire_or_renew()) => r.unwrap_or(false),
            };

            if renewed {
                deadline = Instant::now() + self.config.renew_deadline;
                debug!("Lease renewed");
            } else if Instant::now() >= deadline {
                return ElectionOutcome::LeadershipLost;
            } else {
                warn!("Failed to renew lease, retrying");
            }
        }
    }

    async fn try_acquire_or_renew(&mut self) -> bool {
        let now = Utc::now();
        let mut desired = LeaseRecord::claim(&self.config.identity, self.config.lease_duration, now);

        let (current, version) = match self.lock.get().await {
            Ok(Some(found)) => found,
            Ok(None) => {
                return match self.lock.create(&desired).await {
                    Ok(()) => {
                        self.observe(None);
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "Create lease failed");
                        false
                    }
                };
            }
            Err(e) => {
                warn!(error = %e, "Get lease failed");
                return false;
            }
        };

        if self.observed_version.as_deref() != Some(version.as_str()) {
            self.observe(Some(version.clone()));
        }
        let is_leader = current.holder_identity == self.config.identity;
        if current.is_held()
            && !is_leader
            && self.observed_at + current.lease_duration > Instant::now()
        {
            debug!(holder = %current.holder_identity, "Lease is held by another candidate");
            return false;
        }

        if is_leader {
            desired.acquire_time = current.acquire_time;
            desired.leader_transitions = current.leader_transitions;
        } else {
            desired.leader_transitions = current.leader_transitions + 1;
        }

        match self.lock.update(&desired, &version).await {
            Ok(()) => {
                self.observe(None);
                true
            }
            Err(e) => {
                warn!(error = %e, "Update lease failed");
                false
            }
        }
    }

    /// Clear the holder so another candidate can take over at once
    async fn release(&mut self) {
        let Ok(Some((current, version))) = self.lock.get().await else {
            return;
        };
        if current.holder_identity != self.config.identity {
            return;
        }
        let mut released = LeaseRecord::claim("", Duration::from_secs(1), Utc::now());
        released.leader_transitions = current.leader_transitions;
        match self.lock.update(&released, &version).await {
            Ok(()) => info!(lock = %self.lock.describe(), "Lease released"),
            Err(e) => warn!(error = %e, "Release lease failed"),
        }
    }

    /// Our own writes leave the version unknown until the next read
    fn observe(&mut self, version: Option<String>) {
        self.observed_version = version;
        self.observed_at = Instant::now();
    }
}

/// `period + rand[0, 1) * JITTER_FACTOR * period`
fn jitter(period: Duration) -> Duration {
    period.mul_f64(1.0 + rand::random::<f64>() * JITTER_FACTOR)
}
