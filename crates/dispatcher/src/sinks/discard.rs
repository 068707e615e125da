//! DiscardSink - accepts everything, delivers nothing

use async_trait::async_trait;
use contracts::{ClusterEvent, ContractError, EventSink};

/// Sink that drops every event
#[derive(Debug, Clone)]
pub struct DiscardSink {
    name: String,
}

impl Default for DiscardSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscardSink {
    pub fn new() -> Self {
        Self {
            name: "discard".to_string(),
        }
    }
}

#[async_trait]
impl EventSink for DiscardSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, _event: &ClusterEvent) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
