//! core/v1 Event -> ClusterEvent

use contracts::{ClusterEvent, EventOrigin, InvolvedObject};
use k8s_openapi::api::core::v1::Event;

/// Snapshot a Kubernetes Event
///
/// Missing optional fields become empty strings. Reporters that only fill
/// the `reporting*` fields still get a component and host.
pub fn to_cluster_event(event: &Event) -> ClusterEvent {
    let meta = &event.metadata;
    let object = &event.involved_object;
    let source = event.source.as_ref();

    let component = source
        .and_then(|s| s.component.clone())
        .or_else(|| event.reporting_component.clone())
        .unwrap_or_default();
    let host = source
        .and_then(|s| s.host.clone())
        .or_else(|| event.reporting_instance.clone())
        .unwrap_or_default();

    ClusterEvent {
        uid: meta.uid.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        resource_version: meta.resource_version.clone().unwrap_or_default(),
        event_type: event.type_.clone().unwrap_or_default(),
        reason: event.reason.clone().unwrap_or_default(),
        involved_object: InvolvedObject {
            kind: object.kind.clone().unwrap_or_default(),
            namespace: object.namespace.clone().unwrap_or_default(),
            name: object.name.clone().unwrap_or_default(),
            uid: object.uid.clone().unwrap_or_default(),
        },
        message: event.message.clone().unwrap_or_default(),
        source: EventOrigin { component, host },
        first_timestamp: event.first_timestamp.as_ref().map(|t| t.0),
        last_timestamp: event.last_timestamp.as_ref().map(|t| t.0),
        event_time: event.event_time.as_ref().map(|t| t.0),
        count: event.count.unwrap_or_default(),
    }
}
