//! KubeLeaseLock - coordination.k8s.io/v1 Lease backend

use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::debug;

use crate::error::Result;
use crate::lock::{LeaseLock, LeaseRecord};

/// Lease object in one namespace
///
/// The object's `resourceVersion` is the lock version, so a replace with a
/// stale version is rejected by the API server.
pub struct KubeLeaseLock {
    api: Api<Lease>,
    namespace: String,
    name: String,
}

impl KubeLeaseLock {
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn to_lease(&self, record: &LeaseRecord, version: Option<&str>) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                resource_version: version.map(str::to_string),
                ..Default::default()
            },
            spec: Some(record_to_spec(record)),
        }
    }
}

pub(crate) fn record_to_spec(record: &LeaseRecord) -> LeaseSpec {
    LeaseSpec {
        holder_identity: Some(record.holder_identity.clone()),
        lease_duration_seconds: Some(record.lease_duration.as_secs().min(i32::MAX as u64) as i32),
        acquire_time: Some(MicroTime(record.acquire_time)),
        renew_time: Some(MicroTime(record.renew_time)),
        lease_transitions: Some(record.leader_transitions),
        ..Default::default()
    }
}

/// Missing fields read as a released lease
pub(crate) fn spec_to_record(spec: Option<&LeaseSpec>) -> LeaseRecord {
    let now = Utc::now();
    let Some(spec) = spec else {
        return LeaseRecord::claim("", Duration::ZERO, now);
    };
    LeaseRecord {
        holder_identity: spec.holder_identity.clone().unwrap_or_default(),
        lease_duration: Duration::from_secs(
            spec.lease_duration_seconds.unwrap_or(0).max(0) as u64,
        ),
        acquire_time: spec.acquire_time.as_ref().map(|t| t.0).unwrap_or(now),
        renew_time: spec.renew_time.as_ref().map(|t| t.0).unwrap_or(now),
        leader_transitions: spec.lease_transitions.unwrap_or(0),
    }
}

impl LeaseLock for KubeLeaseLock {
    async fn get(&self) -> Result<Option<(LeaseRecord, String)>> {
        let lease = self.api.get_opt(&self.name).await?;
        Ok(lease.map(|lease| {
            let version = lease.metadata.resource_version.clone().unwrap_or_default();
            (spec_to_record(lease.spec.as_ref()), version)
        }))
    }

    async fn create(&self, record: &LeaseRecord) -> Result<()> {
        self.api
            .create(&PostParams::default(), &self.to_lease(record, None))
            .await?;
        debug!(lock = %self.describe(), "Lease created");
        Ok(())
    }

    async fn update(&self, record: &LeaseRecord, version: &str) -> Result<()> {
        self.api
            .replace(
                &self.name,
                &PostParams::default(),
                &self.to_lease(record, Some(version)),
            )
            .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}
