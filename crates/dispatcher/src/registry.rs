//! Sink registry - builds the ordered sink list from configuration

use std::sync::Arc;

use contracts::{EventSink, ReceiversConfig};
use tracing::{error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::sinks::{DiscardSink, LokiSink, StdoutSink};

/// Ordered, immutable sink list shared by all workers
pub type SinkSet = Vec<Arc<dyn EventSink>>;

/// Build sinks in registration order: loki, stdout
///
/// A sink that fails to construct is logged and left out; the remaining
/// sinks still load. With nothing enabled the discard sink is used so the
/// pipeline keeps running.
#[instrument(name = "dispatcher_build_sinks", skip(config))]
pub fn build_sinks(config: &ReceiversConfig) -> SinkSet {
    let mut sinks: SinkSet = Vec::new();

    if let Some(loki) = &config.loki {
        match LokiSink::new(loki).map_err(|e| DispatcherError::sink_creation("loki", e.to_string()))
        {
            Ok(sink) => sinks.push(Arc::new(sink)),
            Err(e) => error!(error = %e, "Create receiver failed"),
        }
    }

    if config.stdout {
        sinks.push(Arc::new(StdoutSink::new()));
    }

    if sinks.is_empty() {
        warn!("No receiver enabled, events will be discarded");
        sinks.push(Arc::new(DiscardSink::new()));
    }

    for sink in &sinks {
        info!(sink = sink.name(), "Receiver loaded");
    }
    sinks
}
