//! LeaseLock trait - storage for the leadership record

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Contents of the leadership lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    /// Current holder; empty when released
    pub holder_identity: String,
    pub lease_duration: Duration,
    pub acquire_time: DateTime<Utc>,
    pub renew_time: DateTime<Utc>,
    pub leader_transitions: i32,
}

impl LeaseRecord {
    /// Record claiming the lease for `identity` as of `now`
    pub fn claim(identity: &str, lease_duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            holder_identity: identity.to_string(),
            lease_duration,
            acquire_time: now,
            renew_time: now,
            leader_transitions: 0,
        }
    }

    pub fn is_held(&self) -> bool {
        !self.holder_identity.is_empty()
    }
}

/// Versioned lease storage with optimistic concurrency
///
/// `get` returns the record with an opaque version; `update` must fail with
/// `LeadershipError::Conflict` when that version is no longer current.
#[trait_variant::make(LeaseLock: Send)]
pub trait LocalLeaseLock {
    /// Read the record, `None` if the lease does not exist yet
    async fn get(&self) -> Result<Option<(LeaseRecord, String)>>;

    /// Create the lease; fails if it already exists
    async fn create(&self, record: &LeaseRecord) -> Result<()>;

    /// Replace the record if `version` is still current
    async fn update(&self, record: &LeaseRecord, version: &str) -> Result<()>;

    /// Human readable lock location for logs
    fn describe(&self) -> String;
}
