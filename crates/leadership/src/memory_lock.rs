//! In-process lease lock
//!
//! Clones share the same record, so several electors in one process can
//! contend for it. Used by tests and local runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{LeadershipError, Result};
use crate::lock::{LeaseLock, LeaseRecord};

#[derive(Debug, Default)]
struct Slot {
    record: Option<LeaseRecord>,
    version: u64,
}

/// Shared in-memory lease
#[derive(Debug, Clone)]
pub struct MemoryLeaseLock {
    name: String,
    slot: Arc<Mutex<Slot>>,
}

impl MemoryLeaseLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Overwrite the holder, as if another replica took the lease
    pub fn force_holder(&self, identity: &str, lease_duration: Duration) {
        let mut slot = self.slot.lock();
        let transitions = slot
            .record
            .as_ref()
            .map(|r| r.leader_transitions + 1)
            .unwrap_or(0);
        let mut record = LeaseRecord::claim(identity, lease_duration, Utc::now());
        record.leader_transitions = transitions;
        slot.record = Some(record);
        slot.version += 1;
    }

    /// Current holder, `None` when absent or released
    pub fn holder(&self) -> Option<String> {
        self.slot
            .lock()
            .record
            .as_ref()
            .filter(|r| r.is_held())
            .map(|r| r.holder_identity.clone())
    }

    /// Current record, if any
    pub fn record(&self) -> Option<LeaseRecord> {
        self.slot.lock().record.clone()
    }
}

impl LeaseLock for MemoryLeaseLock {
    async fn get(&self) -> Result<Option<(LeaseRecord, String)>> {
        let slot = self.slot.lock();
        Ok(slot
            .record
            .clone()
            .map(|record| (record, slot.version.to_string())))
    }

    async fn create(&self, record: &LeaseRecord) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.record.is_some() {
            return Err(LeadershipError::conflict(&self.name));
        }
        slot.record = Some(record.clone());
        slot.version += 1;
        Ok(())
    }

    async fn update(&self, record: &LeaseRecord, version: &str) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.record.is_none() {
            return Err(LeadershipError::not_found(&self.name));
        }
        if slot.version.to_string() != version {
            return Err(LeadershipError::conflict(&self.name));
        }
        slot.record = Some(record.clone());
        slot.version += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory/{}", self.name)
    }
}
