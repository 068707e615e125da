//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Kubernetes 客户端创建失败
    #[error("failed to create kubernetes client: {0}")]
    Client(#[from] kube::Error),

    /// 通道已关闭
    #[error("notification channel closed")]
    ChannelClosed,
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
