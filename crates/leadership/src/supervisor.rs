//! Supervisor - runs the collector directly or behind leader election

use std::future::Future;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::elector::{ElectionOutcome, LeaderElector};
use crate::lock::LeaseLock;

/// How the workload is started
pub enum RunMode<L> {
    /// Run immediately, no coordination
    Standalone,
    /// Run only while holding the lease
    LeaderElection(LeaderElector<L>),
}

/// Terminal state of a supervised run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorOutcome<T> {
    /// The workload ran and returned
    Completed(T),
    /// Stopped before leadership was ever acquired
    NotStarted,
    /// Unrecoverable; the process must exit
    Fatal(String),
}

impl<T> SupervisorOutcome<T> {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

pub struct Supervisor;

impl Supervisor {
    /// Run `run_fn` according to `mode` until it returns or `stop` fires
    ///
    /// In election mode, losing the lease is reported as
    /// `SupervisorOutcome::Fatal` while the workload is aborted; another
    /// replica may already be leading, so there is no demotion path.
    pub async fn run<L, F, Fut, T>(
        mode: RunMode<L>,
        stop: CancellationToken,
        run_fn: F,
    ) -> SupervisorOutcome<T>
    where
        L: LeaseLock,
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let elector = match mode {
            RunMode::Standalone => {
                info!("Leader election disabled, running standalone");
                return SupervisorOutcome::Completed(run_fn(stop).await);
            }
            RunMode::LeaderElection(elector) => elector,
        };

        let identity = elector.identity().to_string();
        let (tx, mut rx) = oneshot::channel();
        let outcome = elector
            .run(stop, move |token| {
                let workload = run_fn(token);
                async move {
                    let _ = tx.send(workload.await);
                }
            })
            .await;

        match outcome {
            ElectionOutcome::LeadershipLost => {
                let reason = format!("leader election lost: {identity}");
                error!(%reason, "Leadership lost");
                SupervisorOutcome::Fatal(reason)
            }
            ElectionOutcome::Cancelled => match rx.try_recv() {
                Ok(value) => SupervisorOutcome::Completed(value),
                Err(_) => {
                    info!("Stopped before acquiring leadership");
                    SupervisorOutcome::NotStarted
                }
            },
            ElectionOutcome::LeaderExited => match rx.try_recv() {
                Ok(value) => SupervisorOutcome::Completed(value),
                Err(_) => SupervisorOutcome::Fatal("leading task panicked".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elector::ElectionConfig;
    use crate::memory_lock::MemoryLeaseLock;
    use std::time::Duration;

    fn election(lock: &MemoryLeaseLock, identity: &str) -> RunMode<MemoryLeaseLock> {
        RunMode::LeaderElection(
            LeaderElector::new(lock.clone(), ElectionConfig::new(identity)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_standalone_runs_directly() {
        let outcome = Supervisor::run(
            RunMode::<MemoryLeaseLock>::Standalone,
            CancellationToken::new(),
            |_| async { 42 },
        )
        .await;
        assert_eq!(outcome, SupervisorOutcome::Completed(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_workload_result() {
        let lock = MemoryLeaseLock::new("lease");
        let stop = CancellationToken::new();
        let run = tokio::spawn(Supervisor::run(election(&lock, "a"), stop.clone(), |token| async move {
            token.cancelled().await;
            "drained"
        }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        stop.cancel();
        assert_eq!(run.await.unwrap(), SupervisorOutcome::Completed("drained"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_leadership() {
        let lock = MemoryLeaseLock::new("lease");
        lock.force_holder("other", Duration::from_secs(15));
        let stop = CancellationToken::new();
        let run = tokio::spawn(Supervisor::run(election(&lock, "a"), stop.clone(), |_| async {}));

        tokio::time::sleep(Duration::from_secs(5)).await;
        stop.cancel();
        assert_eq!(run.await.unwrap(), SupervisorOutcome::NotStarted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_lease_is_fatal() {
        let lock = MemoryLeaseLock::new("lease");
        let stop = CancellationToken::new();
        let run = tokio::spawn(Supervisor::run(election(&lock, "a"), stop, |token| async move {
            token.cancelled().await;
        }));

        tokio::time::sleep(Duration::from_secs(3)).await;
        lock.force_holder("intruder", Duration::from_secs(15));

        let outcome = run.await.unwrap();
        assert!(outcome.is_fatal());
    }
}
