//! Layered error definitions
//!
//! Categorized by source: config / watch / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// No configuration file found on the search path
    #[error("config file not found, searched: {searched:?}")]
    ConfigNotFound { searched: Vec<String> },

    // ===== Watch Errors =====
    /// Watch stream error
    #[error("watch error: {message}")]
    Watch { message: String },

    // ===== Sink Errors =====
    /// Sink delivery error
    #[error("sink '{sink_name}' send error: {message}")]
    SinkSend { sink_name: String, message: String },

    /// Sink backend answered with a non-2xx status
    #[error("sink '{sink_name}': server returned HTTP status {status} ({status_text}): {body}")]
    SinkHttpStatus {
        sink_name: String,
        status: u16,
        status_text: String,
        body: String,
    },

    /// Sink used after close
    #[error("sink '{sink_name}' is closed")]
    SinkClosed { sink_name: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create watch error
    pub fn watch(message: impl Into<String>) -> Self {
        Self::Watch {
            message: message.into(),
        }
    }

    /// Create sink send error
    pub fn sink_send(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkSend {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink closed error
    pub fn sink_closed(sink_name: impl Into<String>) -> Self {
        Self::SinkClosed {
            sink_name: sink_name.into(),
        }
    }
}
