//! StdoutSink - logs every event as JSON via tracing

use async_trait::async_trait;
use contracts::{ClusterEvent, ContractError, EventSink};
use tracing::{info, instrument};

/// Sink that writes one structured log line per event
pub struct StdoutSink {
    name: String,
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutSink {
    /// Create a new StdoutSink
    pub fn new() -> Self {
        Self {
            name: "stdout".to_string(),
        }
    }

    fn render(&self, event: &ClusterEvent) -> Result<String, ContractError> {
        serde_json::to_string(event)
            .map_err(|e| ContractError::sink_send(&self.name, format!("json error: {e}")))
    }
}

#[async_trait]
impl EventSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "stdout_sink_send",
        skip(self, event),
        fields(sink = %self.name, uid = %event.uid)
    )]
    async fn send(&self, event: &ClusterEvent) -> Result<(), ContractError> {
        let rendered = self.render(event)?;
        info!(event = %rendered, "event");
        Ok(())
    }

    #[instrument(name = "stdout_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
