//! Sink implementations
//!
//! Contains StdoutSink, FileSink, LogSink and MemorySink, plus the
//! config-driven `ConfiguredSink` used by the CLI.

mod configured;
mod file;
mod log;
mod memory;
mod stdout;

pub use self::configured::{ConfiguredSink, SinkKind};
pub use self::file::FileSink;
pub use self::log::LogSink;
pub use self::memory::MemorySink;
pub use self::stdout::StdoutSink;
