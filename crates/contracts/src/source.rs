//! ReadingSource trait - pull-based producer abstraction
//!
//! Sources are lazy, finite and non-restartable. Each call to `next` may
//! suspend the caller until the source's own pacing delay elapses.
//! Heterogeneous sources are registered as `Box<dyn ReadingSource>`.

use async_trait::async_trait;

use crate::{ContractError, Reading};

/// Boxed source, as handed to the ingestion pipeline
pub type BoxedSource = Box<dyn ReadingSource>;

/// Pull-based reading producer
///
/// # Example
///
/// ```ignore
/// let mut source: BoxedSource = Box::new(SimulatedSensor::new(config));
/// while let Some(reading) = source.next().await? {
///     println!("{reading}");
/// }
/// ```
#[async_trait]
pub trait ReadingSource: Send {
    /// Source name (used for logging/metrics)
    ///
    /// Usually the device id of the readings it produces. Not required to be unique.
    fn name(&self) -> &str;

    /// Pull the next reading
    ///
    /// - `Ok(Some(_))`: next reading
    /// - `Ok(None)`: end of stream, never called again afterwards
    /// - `Err(_)`: the source failed; its remaining output is lost
    async fn next(&mut self) -> Result<Option<Reading>, ContractError>;
}

#[async_trait]
impl<S: ReadingSource + ?Sized> ReadingSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn next(&mut self) -> Result<Option<Reading>, ContractError> {
        (**self).next().await
    }
}
