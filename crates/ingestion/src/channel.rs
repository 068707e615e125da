//! ChannelEventSource - in-process source fed through a channel
//!
//! Used for local runs and tests without a cluster.

use contracts::{ClusterEvent, EventSource, Notification};
use tokio::sync::mpsc;

use crate::error::{IngestionError, Result};

/// Sending half of a channel source
#[derive(Clone)]
pub struct ChannelEventSender {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelEventSender {
    pub fn send(&self, notification: Notification) -> Result<()> {
        self.tx
            .send(notification)
            .map_err(|_| IngestionError::ChannelClosed)
    }

    pub fn added(&self, event: ClusterEvent) -> Result<()> {
        self.send(Notification::Added(event))
    }

    pub fn updated(&self, event: ClusterEvent) -> Result<()> {
        self.send(Notification::Updated(event))
    }

    pub fn deleted(&self, event: ClusterEvent) -> Result<()> {
        self.send(Notification::Deleted(event))
    }

    /// Mark the initial list complete
    pub fn synced(&self) -> Result<()> {
        self.send(Notification::Synced)
    }
}

/// Receiving half, consumed by the controller
pub struct ChannelEventSource {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl ChannelEventSource {
    /// Create a connected sender/source pair
    pub fn new() -> (ChannelEventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelEventSender { tx }, Self { rx })
    }
}

impl EventSource for ChannelEventSource {
    async fn next(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_preserves_order() {
        let (tx, mut source) = ChannelEventSource::new();
        tx.added(ClusterEvent::default()).unwrap();
        tx.synced().unwrap();
        drop(tx);

        assert!(matches!(source.next().await, Some(Notification::Added(_))));
        assert_eq!(source.next().await, Some(Notification::Synced));
        assert_eq!(source.next().await, None);
    }

    #[tokio::test]
    async fn test_send_after_source_dropped_fails() {
        let (tx, source) = ChannelEventSource::new();
        drop(source);
        assert!(matches!(tx.synced(), Err(IngestionError::ChannelClosed)));
    }
}
