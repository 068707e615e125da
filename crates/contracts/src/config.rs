//! CollectorConfig - Config Loader output
//!
//! Describes the complete collector configuration: controller tuning,
//! receivers, leader election and observability.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Complete collector configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CollectorConfig {
    /// Default log level (overridden by `RUST_LOG`)
    #[serde(default = "default_log")]
    pub log: String,

    /// Controller tuning
    #[serde(default)]
    #[validate(nested)]
    pub controller: ControllerSettings,

    /// Enabled receivers
    #[serde(default)]
    #[validate(nested)]
    pub receivers: ReceiversConfig,

    /// Leader election settings (used when election mode is selected)
    #[serde(default)]
    #[validate(nested)]
    pub leader_election: LeaderElectionSettings,

    /// Logging and metrics export
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            log: default_log(),
            controller: ControllerSettings::default(),
            receivers: ReceiversConfig::default(),
            leader_election: LeaderElectionSettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

fn default_log() -> String {
    "info".to_string()
}

/// Controller tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ControllerSettings {
    /// Number of concurrent worker loops
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 1024))]
    pub workers: usize,

    /// Events older than this at enqueue time are dropped
    #[serde(default = "default_staleness_window_secs")]
    #[validate(range(min = 1))]
    pub staleness_window_secs: u64,

    /// Upper bound on the initial cache sync
    #[serde(default = "default_sync_timeout_secs")]
    #[validate(range(min = 1))]
    pub sync_timeout_secs: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            staleness_window_secs: default_staleness_window_secs(),
            sync_timeout_secs: default_sync_timeout_secs(),
        }
    }
}

impl ControllerSettings {
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

fn default_workers() -> usize {
    10
}

fn default_staleness_window_secs() -> u64 {
    5
}

fn default_sync_timeout_secs() -> u64 {
    60
}

/// Receivers to enable
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReceiversConfig {
    /// Loki push endpoint (absent = disabled)
    #[serde(default)]
    #[validate(nested)]
    pub loki: Option<LokiConfig>,

    /// Log every event to stdout
    #[serde(default)]
    pub stdout: bool,
}

impl ReceiversConfig {
    /// Whether at least one receiver is enabled
    pub fn any_enabled(&self) -> bool {
        self.loki.is_some() || self.stdout
    }
}

/// Loki receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LokiConfig {
    /// Push API URL, e.g. `http://loki:3100/loki/api/v1/push`
    #[validate(url)]
    pub url: String,

    /// Static stream labels in selector syntax: `{cluster="dev"}`
    #[serde(default)]
    #[validate(custom(function = "validate_label_selector"))]
    pub labels: String,

    /// Request timeout
    #[serde(default = "default_loki_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Accepted for compatibility; events are pushed one by one
    #[serde(default)]
    pub batch_wait_ms: Option<u64>,

    /// Accepted for compatibility; events are pushed one by one
    #[serde(default)]
    pub batch_entries_number: Option<usize>,
}

impl LokiConfig {
    /// Config pointing at `url` with every other field defaulted
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            labels: String::new(),
            timeout_secs: default_loki_timeout_secs(),
            batch_wait_ms: None,
            batch_entries_number: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_loki_timeout_secs() -> u64 {
    5
}

fn validate_label_selector(labels: &str) -> Result<(), ValidationError> {
    parse_label_selector(labels)
        .map(|_| ())
        .map_err(|message| ValidationError::new("label_selector").with_message(message.into()))
}

/// Parse a Loki label selector such as `{cluster="dev", env="prod"}`
///
/// Braces are optional and an empty string yields no labels. Values are
/// double-quoted and may contain commas and `\"` / `\\` escapes.
///
/// # Errors
/// Returns a description of the first malformed pair
pub fn parse_label_selector(input: &str) -> Result<Vec<(String, String)>, String> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);

    let mut labels = Vec::new();
    for pair in split_pairs(body)?.into_iter().map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("label '{pair}' is missing '='"))?;
        let key = key.trim();
        if !is_label_name(key) {
            return Err(format!("invalid label name '{key}'"));
        }
        let value = value.trim();
        let quoted = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .ok_or_else(|| format!("label '{key}' value must be double-quoted"))?;
        labels.push((key.to_string(), unescape(quoted)));
    }
    Ok(labels)
}

/// Split on commas outside double quotes
fn split_pairs(body: &str) -> Result<Vec<&str>, String> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                pairs.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quoted label value".to_string());
    }
    pairs.push(&body[start..]);
    Ok(pairs)
}

/// Prometheus label name: `[A-Za-z_][A-Za-z0-9_]*`
fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Leader election settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_election_durations"))]
pub struct LeaderElectionSettings {
    /// Lease object name
    #[serde(default = "default_lease_name")]
    #[validate(length(min = 1))]
    pub lease_name: String,

    /// Lease namespace (default: pod namespace, then `default`)
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default = "default_lease_duration_secs")]
    pub lease_duration_secs: u64,

    #[serde(default = "default_renew_deadline_secs")]
    pub renew_deadline_secs: u64,

    #[serde(default = "default_retry_period_secs")]
    pub retry_period_secs: u64,
}

impl Default for LeaderElectionSettings {
    fn default() -> Self {
        Self {
            lease_name: default_lease_name(),
            namespace: None,
            lease_duration_secs: default_lease_duration_secs(),
            renew_deadline_secs: default_renew_deadline_secs(),
            retry_period_secs: default_retry_period_secs(),
        }
    }
}

impl LeaderElectionSettings {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }

    pub fn renew_deadline(&self) -> Duration {
        Duration::from_secs(self.renew_deadline_secs)
    }

    pub fn retry_period(&self) -> Duration {
        Duration::from_secs(self.retry_period_secs)
    }
}

fn validate_election_durations(settings: &LeaderElectionSettings) -> Result<(), ValidationError> {
    if settings.retry_period_secs == 0 {
        return Err(ValidationError::new("retry_period")
            .with_message("retry_period_secs must be > 0".into()));
    }
    if settings.lease_duration_secs <= settings.renew_deadline_secs {
        return Err(ValidationError::new("lease_duration")
            .with_message("lease_duration_secs must be greater than renew_deadline_secs".into()));
    }
    if settings.renew_deadline_secs <= settings.retry_period_secs {
        return Err(ValidationError::new("renew_deadline")
            .with_message("renew_deadline_secs must be greater than retry_period_secs".into()));
    }
    Ok(())
}

fn default_lease_name() -> String {
    "loki-event-collector".to_string()
}

fn default_lease_duration_secs() -> u64 {
    15
}

fn default_renew_deadline_secs() -> u64 {
    10
}

fn default_retry_period_secs() -> u64 {
    2
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging and metrics export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus exporter port (0 = disabled)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            metrics_port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_policy() {
        let config = CollectorConfig::default();
        assert_eq!(config.controller.staleness_window(), Duration::from_secs(5));
        assert_eq!(config.leader_election.lease_duration(), Duration::from_secs(15));
        assert_eq!(config.leader_election.renew_deadline(), Duration::from_secs(10));
        assert_eq!(config.leader_election.retry_period(), Duration::from_secs(2));
        assert_eq!(LokiConfig::new("http://loki").timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_label_selector() {
        let labels = parse_label_selector(r#"{cluster="dev", env="prod"}"#).unwrap();
        assert_eq!(
            labels,
            vec![
                ("cluster".to_string(), "dev".to_string()),
                ("env".to_string(), "prod".to_string()),
            ]
        );
        assert!(parse_label_selector("").unwrap().is_empty());
        assert!(parse_label_selector("{}").unwrap().is_empty());
        assert!(parse_label_selector(r#"{cluster=dev}"#).is_err());
        assert!(parse_label_selector(r#"{bad-key="x"}"#).is_err());
    }

    #[test]
    fn test_label_selector_quoted_commas_and_names() {
        let labels =
            parse_label_selector(r#"{team="a,b", note="say \"hi\"", _env="dev"}"#).unwrap();
        assert_eq!(
            labels,
            vec![
                ("team".to_string(), "a,b".to_string()),
                ("note".to_string(), r#"say "hi""#.to_string()),
                ("_env".to_string(), "dev".to_string()),
            ]
        );
        assert!(parse_label_selector(r#"{1team="x"}"#).is_err());
        assert!(parse_label_selector(r#"{team="a,b}"#).is_err());
        assert!(parse_label_selector(r#"{team="}"#).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_election_durations() {
        let settings = LeaderElectionSettings {
            lease_duration_secs: 10,
            renew_deadline_secs: 10,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(LeaderElectionSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_loki_url() {
        let mut config = CollectorConfig::default();
        config.receivers.loki = Some(LokiConfig::new("not a url"));
        assert!(config.validate().is_err());

        config.receivers.loki = Some(LokiConfig::new("http://loki:3100/loki/api/v1/push"));
        assert!(config.validate().is_ok());
    }
}
