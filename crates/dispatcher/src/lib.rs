//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 过滤过期事件并放入工作队列
//! - 固定数量的 worker 并发消费队列
//! - Fan-out 到多个 sinks，单个 sink 失败不影响其他 sink

pub mod controller;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod sinks;

pub use contracts::{ClusterEvent, EventSink};
pub use controller::{
    ControllerConfig, ControllerHandle, ControllerState, EventController, RunOutcome,
    StalenessFilter,
};
pub use error::DispatcherError;
pub use metrics::{ControllerMetrics, MetricsSnapshot, SinkMetrics};
pub use queue::EventQueue;
pub use registry::{build_sinks, SinkSet};
pub use sinks::{DiscardSink, LokiSink, StdoutSink};
