//! Leadership 错误类型

use thiserror::Error;

/// Leader election errors
#[derive(Debug, Error)]
pub enum LeadershipError {
    /// Kubernetes API request failed
    #[error("lease request failed: {0}")]
    Kube(#[from] kube::Error),

    /// Optimistic concurrency check failed
    #[error("lease {lock} was modified concurrently")]
    Conflict { lock: String },

    /// Lease does not exist (update without create)
    #[error("lease {lock} not found")]
    NotFound { lock: String },

    /// Election timing is inconsistent
    #[error("invalid election config: {0}")]
    InvalidConfig(String),
}

impl LeadershipError {
    pub fn conflict(lock: impl Into<String>) -> Self {
        Self::Conflict { lock: lock.into() }
    }

    pub fn not_found(lock: impl Into<String>) -> Self {
        Self::NotFound { lock: lock.into() }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Leadership Result 类型别名
pub type Result<T> = std::result::Result<T, LeadershipError>;
