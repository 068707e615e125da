//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace:
//! the event data model, the sink and source traits, and the collector
//! configuration. Business crates depend on this crate only; reverse
//! dependencies are prohibited.
//!
//! ## Time Model
//! - Event timestamps are wall-clock `chrono::DateTime<Utc>` as reported by
//!   the cluster
//! - Staleness is judged against the local wall clock at enqueue time

mod config;
mod error;
mod event;
mod sink;
mod source;

pub use config::*;
pub use error::*;
pub use event::*;
pub use sink::EventSink;
pub use source::{EventSource, LocalEventSource, Notification};
