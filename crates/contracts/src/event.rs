//! ClusterEvent - snapshot of a Kubernetes Event resource
//!
//! Created by the watch layer on add/update notifications and shared
//! read-only between the queue, the workers and every sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Object the event is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

/// Component that reported the event
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventOrigin {
    pub component: String,
    pub host: String,
}

/// Immutable snapshot of a cluster-reported occurrence
///
/// Equality and hashing are by content, so two notifications carrying the
/// same resource version compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterEvent {
    /// Event object UID
    pub uid: String,
    /// Event object name
    pub name: String,
    /// Event object namespace
    pub namespace: String,
    /// Resource version at observation time
    pub resource_version: String,
    /// `Normal` or `Warning`
    pub event_type: String,
    /// Short machine-readable reason (e.g. `Scheduled`)
    pub reason: String,
    pub involved_object: InvolvedObject,
    /// Human-readable description
    pub message: String,
    pub source: EventOrigin,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Micro-precision time filled in by newer reporters
    pub event_time: Option<DateTime<Utc>>,
    pub count: i32,
}

impl ClusterEvent {
    /// Most recent observation time known for this event
    ///
    /// Falls back to `event_time`, then `first_timestamp`, when the reporter
    /// left `last_timestamp` empty.
    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
            .or(self.event_time)
            .or(self.first_timestamp)
    }

    /// Age of the event at `now`
    ///
    /// `None` when no timestamp is known. Timestamps in the future (clock
    /// skew) yield a zero age.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        let observed = self.last_observed()?;
        Some((now - observed).to_std().unwrap_or(Duration::ZERO))
    }

    /// `kind/name` of the involved object
    pub fn object_ref(&self) -> String {
        format!("{}/{}", self.involved_object.kind, self.involved_object.name)
    }
}
