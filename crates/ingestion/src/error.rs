//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Collector 任务 panic
    #[error("collector task for source {source_name} panicked: {message}")]
    CollectorPanicked {
        /// 数据源名称
        source_name: String,
        /// 错误消息
        message: String,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
