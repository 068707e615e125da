//! # Ingestion
//!
//! Cluster event ingestion module.
//!
//! Responsibilities:
//! - Subscribe to core/v1 Event changes through the kube watcher
//! - Convert Kubernetes objects into `ClusterEvent` snapshots
//! - Expose the feed through the `EventSource` trait
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::KubeEventSource;
//!
//! let client = kube::Client::try_default().await?;
//! let source = KubeEventSource::all(client);
//! let controller = EventController::new(source, sinks, config);
//! ```
//!
//! ## Testing Without a Cluster
//!
//! ```ignore
//! use ingestion::ChannelEventSource;
//!
//! let (tx, source) = ChannelEventSource::new();
//! tx.synced()?;
//! ```

mod channel;
mod convert;
mod error;
mod kube_source;

// Re-exports
pub use channel::{ChannelEventSender, ChannelEventSource};
pub use contracts::{ClusterEvent, Notification};
pub use convert::to_cluster_event;
pub use error::{IngestionError, Result};
pub use kube_source::KubeEventSource;
