//! # Dispatcher
//!
//! 数据投递模块。
//!
//! 负责：
//! - 立即模式：逐条写入 sink，失败时指数退避重试
//! - 批量模式：按大小或超时攒批后写入 sink
//! - 具体 sink 实现（stdout / file / log / memory）

pub mod batch;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod sinks;

pub use batch::{BatchReport, BatchScheduler, FlushReason, FlushRecord};
pub use contracts::{DataSink, Reading};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use retry::{RetryForwarder, RetryOutcome, RetryPolicy};
pub use sinks::{ConfiguredSink, FileSink, LogSink, MemorySink, SinkKind, StdoutSink};
