//! EventSource trait - watch subscription interface

use crate::ClusterEvent;

/// Typed watch notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Object seen for the first time
    Added(ClusterEvent),
    /// Object changed (or re-listed)
    Updated(ClusterEvent),
    /// Object removed from the cluster
    Deleted(ClusterEvent),
    /// Initial list is complete; emitted once
    Synced,
}

/// Live feed of event notifications
///
/// Implementations retry transient watch failures internally. `next`
/// returning `None` means the feed has ended for good.
#[trait_variant::make(EventSource: Send)]
pub trait LocalEventSource {
    /// Wait for the next notification
    async fn next(&mut self) -> Option<Notification>;
}
