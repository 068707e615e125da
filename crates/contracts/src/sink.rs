//! EventSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for sinks.

use async_trait::async_trait;

use crate::{ClusterEvent, ContractError};

/// Event delivery target
///
/// All sink implementations must implement this trait. Sinks are shared by
/// every worker, so methods take `&self` and implementations synchronize
/// internally where they hold state.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Whether the event should be delivered to this sink
    fn filter(&self, _event: &ClusterEvent) -> bool {
        true
    }

    /// Deliver one event
    ///
    /// Implementations bound the call with their own timeout and never
    /// retry.
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn send(&self, event: &ClusterEvent) -> Result<(), ContractError>;

    /// Release backend resources. Idempotent.
    async fn close(&self) -> Result<(), ContractError>;
}
