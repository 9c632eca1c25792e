//! Simulated sensor source
//!
//! Used for demos and tests without real hardware.

use async_trait::async_trait;
use contracts::{BoxedSource, ContractError, Reading, ReadingSource, SourceConfig};
use tokio::time::sleep;
use tracing::trace;

/// Simulated sensor
///
/// Sleeps `delay` before each reading, then yields `base_value + i * step`,
/// stamped with the current unix time. Ends after `count` readings.
pub struct SimulatedSensor {
    config: SourceConfig,
    produced: usize,
}

impl SimulatedSensor {
    /// Create a simulated sensor from its configuration
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            produced: 0,
        }
    }

    /// Five readings `20.0, 20.5, ... 22.0`, one every `delay`
    pub fn with_delay(device_id: &str, delay: std::time::Duration) -> Self {
        Self::new(SourceConfig::new(device_id, delay))
    }

    /// Box the sensor for registration
    pub fn boxed(self) -> BoxedSource {
        Box::new(self)
    }

    /// Build boxed sources for every configured sensor
    pub fn from_configs(configs: &[SourceConfig]) -> Vec<BoxedSource> {
        configs
            .iter()
            .cloned()
            .map(|config| Self::new(config).boxed())
            .collect()
    }

    /// Readings produced so far
    pub fn produced(&self) -> usize {
        self.produced
    }
}

#[async_trait]
impl ReadingSource for SimulatedSensor {
    fn name(&self) -> &str {
        &self.config.device_id
    }

    async fn next(&mut self) -> Result<Option<Reading>, ContractError> {
        if self.produced >= self.config.count {
            return Ok(None);
        }

        if !self.config.delay().is_zero() {
            sleep(self.config.delay()).await;
        }

        if self.config.fail_after == Some(self.produced) {
            return Err(ContractError::source_failed(
                &self.config.device_id,
                format!("simulated fault after {} readings", self.produced),
            ));
        }

        let value = self.config.base_value + self.produced as f64 * self.config.step;
        self.produced += 1;
        trace!(device_id = %self.config.device_id, value, "simulated reading");

        Ok(Some(Reading::now(&self.config.device_id, value)))
    }
}
