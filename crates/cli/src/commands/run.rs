//! `run` command implementation.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::CollectorConfig;
use dispatcher::{build_sinks, ControllerConfig, EventController, RunOutcome};
use ingestion::KubeEventSource;
use leadership::{
    new_identity, ElectionConfig, KubeLeaseLock, LeaderElector, RunMode, Supervisor,
    SupervisorOutcome,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::init_logging;
use crate::cli::{Cli, RunArgs};

/// Service account namespace, mounted in every pod
const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

const DEFAULT_NAMESPACE: &str = "default";

/// Execute the `run` command
pub async fn run_collector(cli: &Cli, args: &RunArgs) -> Result<ExitCode> {
    let (mut config, path) =
        ConfigLoader::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, args);

    init_logging(cli, &config)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        workers = config.controller.workers,
        leader_elect = args.leader_elect,
        "Loki event collector starting"
    );

    let client = kube::Client::try_default()
        .await
        .context("Failed to create kubernetes client")?;

    let sinks = build_sinks(&config.receivers);
    let controller = EventController::new(
        KubeEventSource::all(client.clone()),
        sinks,
        ControllerConfig::from(&config.controller),
    );

    let mode = if args.leader_elect {
        let namespace = lease_namespace(&config, Path::new(NAMESPACE_FILE));
        let lock = KubeLeaseLock::new(client, &namespace, &config.leader_election.lease_name);
        let identity = new_identity();
        info!(identity = %identity, namespace = %namespace, "Leader election enabled");
        let election = ElectionConfig::from_settings(identity, &config.leader_election);
        RunMode::LeaderElection(LeaderElector::new(lock, election)?)
    } else {
        RunMode::Standalone
    };

    let stop = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(stop.clone()));

    let workers = config.controller.workers;
    let outcome = Supervisor::run(mode, stop, move |token| controller.run(workers, token)).await;

    match outcome {
        SupervisorOutcome::Completed(RunOutcome::Stopped) => {
            info!("Loki event collector stopped");
            Ok(ExitCode::SUCCESS)
        }
        SupervisorOutcome::Completed(RunOutcome::SyncAborted) => {
            error!("Event cache never synced, exiting");
            Ok(ExitCode::FAILURE)
        }
        SupervisorOutcome::NotStarted => {
            info!("Stopped before becoming leader");
            Ok(ExitCode::SUCCESS)
        }
        SupervisorOutcome::Fatal(reason) => {
            error!(%reason, "Fatal error, exiting");
            std::process::exit(1);
        }
    }
}

fn apply_overrides(config: &mut CollectorConfig, args: &RunArgs) {
    if let Some(workers) = args.workers {
        config.controller.workers = workers.max(1);
    }
    if let Some(port) = args.metrics_port {
        config.observability.metrics_port = port;
    }
}

/// Configured namespace, else the pod's own, else `default`
fn lease_namespace(config: &CollectorConfig, namespace_file: &Path) -> String {
    if let Some(namespace) = &config.leader_election.namespace {
        return namespace.clone();
    }
    std::fs::read_to_string(namespace_file)
        .ok()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

/// Cancel `stop` on Ctrl+C or SIGTERM
async fn shutdown_on_signal(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping");
    stop.cancel();
}
