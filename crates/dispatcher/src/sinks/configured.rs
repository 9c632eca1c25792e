//! ConfiguredSink - sink selected at runtime

use std::path::PathBuf;

use contracts::{ContractError, DataSink, Reading};
use tracing::instrument;

use crate::error::DispatcherError;
use crate::sinks::{FileSink, LogSink, StdoutSink};

/// Sink selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    /// Print lines to stdout
    Stdout,
    /// Append lines to a file
    File(PathBuf),
    /// Emit tracing events
    Log,
}

/// One of the built-in sinks
pub enum ConfiguredSink {
    Stdout(StdoutSink),
    File(FileSink),
    Log(LogSink),
}

impl ConfiguredSink {
    /// Build a sink from its kind
    #[instrument(name = "dispatcher_create_sink", skip(name))]
    pub async fn create(name: &str, kind: &SinkKind) -> Result<Self, DispatcherError> {
        Ok(match kind {
            SinkKind::Stdout => Self::Stdout(StdoutSink::new(name)),
            SinkKind::File(path) => Self::File(FileSink::create(name, path).await?),
            SinkKind::Log => Self::Log(LogSink::new(name)),
        })
    }
}

impl DataSink for ConfiguredSink {
    fn name(&self) -> &str {
        match self {
            Self::Stdout(sink) => sink.name(),
            Self::File(sink) => sink.name(),
            Self::Log(sink) => sink.name(),
        }
    }

    async fn write(&mut self, reading: &Reading) -> Result<(), ContractError> {
        match self {
            Self::Stdout(sink) => sink.write(reading).await,
            Self::File(sink) => sink.write(reading).await,
            Self::Log(sink) => sink.write(reading).await,
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Stdout(sink) => sink.flush().await,
            Self::File(sink) => sink.flush().await,
            Self::Log(sink) => sink.flush().await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Stdout(sink) => sink.close().await,
            Self::File(sink) => sink.close().await,
            Self::Log(sink) => sink.close().await,
        }
    }
}
