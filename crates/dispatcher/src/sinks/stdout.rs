//! StdoutSink - one rendered line per reading on standard output

use contracts::{ContractError, DataSink, Reading};
use tokio::io::{AsyncWriteExt, Stdout};
use tracing::instrument;

/// Sink that prints `<device_id>: value=<v>` lines to stdout
///
/// Every line is flushed as soon as it is written.
pub struct StdoutSink {
    name: String,
    out: Stdout,
}

impl StdoutSink {
    /// Create a new StdoutSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new("stdout")
    }
}

impl DataSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, reading: &Reading) -> Result<(), ContractError> {
        let mut line = reading.render();
        line.push('\n');
        self.out
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        self.out
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(self.out.flush().await?)
    }

    #[instrument(name = "stdout_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await
    }
}
