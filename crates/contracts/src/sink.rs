//! DataSink trait - emission interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, Reading};

/// Data output trait
///
/// All sink implementations must implement this trait.
/// A successful `write` means the reading was emitted exactly once.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Emit a single reading
    ///
    /// # Errors
    /// Returns write error (should include context). A failed write has no
    /// visible side effect and may be retried.
    async fn write(&mut self, reading: &Reading) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
