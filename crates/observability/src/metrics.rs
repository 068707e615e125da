//! Event pipeline 指标收集模块
//!
//! 所有指标通过 `metrics` facade 记录；未安装 recorder 时为空操作。

use metrics::{counter, gauge};

/// 记录 watch 通知
///
/// `kind` 为 `added` / `updated` / `deleted`。
pub fn record_event_received(kind: &'static str) {
    counter!("event_collector_events_received_total", "kind" => kind).increment(1);
}

/// 记录因过期被丢弃的事件
pub fn record_event_stale() {
    counter!("event_collector_events_stale_total").increment(1);
}

/// 记录入队事件
pub fn record_event_enqueued(queue_depth: usize) {
    counter!("event_collector_events_enqueued_total").increment(1);
    gauge!("event_collector_queue_depth").set(queue_depth as f64);
}

/// 记录单个 sink 的发送结果
pub fn record_sink_send(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "event_collector_sink_sends_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录 leader 状态 (1 = 持有 lease)
pub fn record_leader(identity: &str, leading: bool) {
    gauge!("event_collector_leader", "identity" => identity.to_string())
        .set(if leading { 1.0 } else { 0.0 });
}

/// 记录 leader 切换
pub fn record_leader_transition(identity: &str) {
    counter!(
        "event_collector_leader_transitions_total",
        "identity" => identity.to_string()
    )
    .increment(1);
}
