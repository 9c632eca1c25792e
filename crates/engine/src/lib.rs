//! # Engine
//!
//! 并发多源采集引擎的对外入口。
//!
//! - `run_immediate`：每条读数立即投递，失败按指数退避重试
//! - `run_batched`：汇聚到共享通道，按大小或超时批量投递
//!
//! 两者都在所有数据源结束、缓冲数据全部投递后才返回。

pub mod engine;
pub mod error;
pub mod report;

pub use engine::{run_batched, run_immediate, StreamEngine};
pub use error::{EngineError, Result};
pub use report::RunReport;
