//! LokiSink - one HTTP push per event to the Loki push API

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contracts::{parse_label_selector, ClusterEvent, ContractError, EventSink, LokiConfig};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Upper bound on the response body kept for diagnostics
pub const MAX_ERROR_BODY_LEN: usize = 1024;

/// Body of a Loki push request
#[derive(Debug, Clone, Serialize)]
pub struct PushRequest {
    pub streams: Vec<PushStream>,
}

/// One labelled stream with its `[timestamp, line]` entries
#[derive(Debug, Clone, Serialize)]
pub struct PushStream {
    pub stream: BTreeMap<String, String>,
    pub values: Vec<[String; 2]>,
}

/// Sink that pushes every event to Loki
pub struct LokiSink {
    name: String,
    url: String,
    client: reqwest::Client,
    static_labels: Vec<(String, String)>,
    closed: AtomicBool,
}

impl LokiSink {
    /// Create a new LokiSink
    ///
    /// # Errors
    /// Invalid URL, malformed static labels, or HTTP client construction
    /// failure.
    pub fn new(config: &LokiConfig) -> Result<Self, ContractError> {
        let name = "loki".to_string();
        reqwest::Url::parse(&config.url).map_err(|e| {
            ContractError::config_validation("receivers.loki.url", format!("{}: {e}", config.url))
        })?;
        let static_labels = parse_label_selector(&config.labels)
            .map_err(|e| ContractError::config_validation("receivers.loki.labels", e))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ContractError::sink_send(&name, format!("http client: {e}")))?;

        if config.batch_wait_ms.is_some() || config.batch_entries_number.is_some() {
            debug!(
                sink = %name,
                batch_wait_ms = ?config.batch_wait_ms,
                batch_entries_number = ?config.batch_entries_number,
                "Batching options ignored, events are pushed individually"
            );
        }
        info!(sink = %name, url = %config.url, timeout = ?config.timeout(), "Using Loki endpoint");

        Ok(Self {
            name,
            url: config.url.clone(),
            client,
            static_labels,
            closed: AtomicBool::new(false),
        })
    }

    /// Stream labels for an event
    ///
    /// Event-derived labels override static ones; empty values are omitted.
    pub fn labels(&self, event: &ClusterEvent) -> BTreeMap<String, String> {
        let mut labels: BTreeMap<String, String> = self.static_labels.iter().cloned().collect();
        let derived = [
            ("_kind", &event.involved_object.kind),
            ("_namespace", &event.involved_object.namespace),
            ("_host", &event.source.host),
            ("_type", &event.event_type),
        ];
        for (key, value) in derived {
            if !value.is_empty() {
                labels.insert(key.to_string(), value.clone());
            }
        }
        labels
    }

    /// Single-line summary of an event
    pub fn line(event: &ClusterEvent, now: DateTime<Utc>) -> String {
        let age = event
            .age(now)
            .map(|age| format!("{:.1}s", age.as_secs_f64()))
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "[{}] {} [{}][{}] {} uid: [{}] age: {}",
            event.event_type,
            event.reason,
            event.involved_object.namespace,
            event.object_ref(),
            event.message,
            event.involved_object.uid,
            age
        )
    }

    /// Build the push body for one event
    pub fn build_push_request(&self, event: &ClusterEvent, now: DateTime<Utc>) -> PushRequest {
        let timestamp = event
            .last_observed()
            .and_then(|ts| ts.timestamp_nanos_opt())
            .or_else(|| now.timestamp_nanos_opt())
            .unwrap_or_default();

        PushRequest {
            streams: vec![PushStream {
                stream: self.labels(event),
                values: vec![[timestamp.to_string(), Self::line(event, now)]],
            }],
        }
    }

    /// First line of the response body, capped at `MAX_ERROR_BODY_LEN` bytes
    async fn error_body(mut response: reqwest::Response) -> String {
        let mut buf = Vec::with_capacity(MAX_ERROR_BODY_LEN);
        while buf.len() < MAX_ERROR_BODY_LEN {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let take = (MAX_ERROR_BODY_LEN - buf.len()).min(chunk.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
                _ => break,
            }
        }
        String::from_utf8_lossy(&buf)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl EventSink for LokiSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "loki_sink_send",
        skip(self, event),
        fields(sink = %self.name, uid = %event.uid)
    )]
    async fn send(&self, event: &ClusterEvent) -> Result<(), ContractError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ContractError::sink_closed(&self.name));
        }

        let body = self.build_push_request(event, Utc::now());
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ContractError::sink_send(&self.name, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(sink = %self.name, status = status.as_u16(), "Pushed");
            return Ok(());
        }

        Err(ContractError::SinkHttpStatus {
            sink_name: self.name.clone(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: Self::error_body(response).await,
        })
    }

    #[instrument(name = "loki_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(sink = %self.name, "LokiSink closed");
        }
        Ok(())
    }
}
