//! Command implementations.

mod run;
mod validate;

pub use run::run_collector;
pub use validate::run_validate;

use anyhow::Result;
use contracts::CollectorConfig;
use observability::{LogFormat, ObservabilityConfig};

use crate::cli::Cli;

/// Initialize logging from CLI flags layered over the configuration
pub(crate) fn init_logging(cli: &Cli, config: &CollectorConfig) -> Result<()> {
    let mut settings = config.observability.clone();
    if let Some(format) = cli.log_format {
        settings.log_format = LogFormat::from(format);
    }
    let level = match cli.level_override() {
        Some(level) => level,
        None => config.log.as_str(),
    };
    observability::init_with_config(ObservabilityConfig::from_settings(&settings, level))
}
