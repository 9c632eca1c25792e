//! LogSink - emits readings via tracing

use contracts::{ContractError, DataSink, Reading};
use tracing::{info, instrument};

/// Sink that logs each reading as a structured event
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, reading: &Reading) -> Result<(), ContractError> {
        self.written += 1;
        info!(
            sink = %self.name,
            device_id = %reading.device_id,
            value = reading.value,
            timestamp = reading.timestamp,
            line = %reading,
            "reading emitted"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, written = self.written, "LogSink closed");
        Ok(())
    }
}
