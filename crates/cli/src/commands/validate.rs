//! `validate` command implementation.

use std::process::ExitCode;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::CollectorConfig;
use serde::Serialize;
use tracing::info;

use super::init_logging;
use crate::cli::{Cli, ValidateArgs};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    workers: usize,
    staleness_window_secs: u64,
    receivers: Vec<&'static str>,
    lease_name: String,
}

/// Execute the `validate` command
pub fn run_validate(cli: &Cli, args: &ValidateArgs) -> Result<ExitCode> {
    if !args.json {
        init_logging(cli, &CollectorConfig::default())?;
        info!("Validating configuration");
    }

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    Ok(if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    match ConfigLoader::load(args.config.as_deref()) {
        Ok((config, path)) => ValidationResult {
            valid: true,
            config_path: Some(path.display().to_string()),
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(summarize(&config)),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path: args.config.as_ref().map(|p| p.display().to_string()),
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

fn summarize(config: &CollectorConfig) -> ConfigSummary {
    let mut receivers = Vec::new();
    if config.receivers.loki.is_some() {
        receivers.push("loki");
    }
    if config.receivers.stdout {
        receivers.push("stdout");
    }
    ConfigSummary {
        workers: config.controller.workers,
        staleness_window_secs: config.controller.staleness_window_secs,
        receivers,
        lease_name: config.leader_election.lease_name.clone(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &CollectorConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.receivers.any_enabled() {
        warnings.push("No receiver enabled - events will be discarded".to_string());
    }

    if let Some(loki) = &config.receivers.loki {
        if loki.batch_wait_ms.is_some() || loki.batch_entries_number.is_some() {
            warnings.push("receivers.loki batch settings are accepted but not used".to_string());
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    let path = result.config_path.as_deref().unwrap_or("<search path>");
    if result.valid {
        println!("✓ Configuration is valid: {path}");

        if let Some(ref summary) = result.summary {
            println!("\n  Workers: {}", summary.workers);
            println!("  Staleness window: {}s", summary.staleness_window_secs);
            println!("  Receivers: {}", summary.receivers.join(", "));
            println!("  Lease: {}", summary.lease_name);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {path}");
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
