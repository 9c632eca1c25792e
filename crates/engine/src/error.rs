//! Engine 错误类型

use ingestion::IngestionError;
use thiserror::Error;

/// Engine 错误
///
/// Source failures and abandoned readings are not errors. Only a panicked
/// task surfaces here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 任务 panic
    #[error("{task} task panicked: {message}")]
    TaskPanicked {
        /// 任务名称
        task: String,
        /// 错误消息
        message: String,
    },
}

impl EngineError {
    pub fn task_panicked(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskPanicked {
            task: task.into(),
            message: message.into(),
        }
    }
}

impl From<IngestionError> for EngineError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::CollectorPanicked {
                source_name,
                message,
            } => Self::task_panicked(format!("collector '{source_name}'"), message),
        }
    }
}

/// Engine Result 类型别名
pub type Result<T> = std::result::Result<T, EngineError>;
