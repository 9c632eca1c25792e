//! Engine and source configuration contracts
//!
//! Shared by config_loader (file parsing), engine (runtime) and cli (overrides).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default attempt budget per reading
pub const MAX_RETRIES: u32 = 3;
/// Default backoff base (0.5s)
pub const RETRY_BACKOFF_BASE_MS: u64 = 500;
/// Default batch size threshold
pub const BATCH_SIZE: usize = 10;
/// Default batch time threshold (1.0s)
pub const BATCH_TIMEOUT_MS: u64 = 1000;

/// Whole milliseconds, rounding sub-millisecond remainders up so that a
/// non-zero duration never becomes 0ms
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// Full stream configuration (config file root)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct StreamConfig {
    /// Engine settings
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineConfig,

    /// Simulated sources to run
    #[serde(default)]
    #[validate(nested)]
    pub sources: Vec<SourceConfig>,
}

/// How readings travel from collectors to the sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One task per source, each reading emitted through the retry pipeline
    #[default]
    Immediate,
    /// Fan-in to a shared channel, emitted in size/time bounded batches
    Batched,
}

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Delivery mode
    #[serde(default)]
    pub mode: DeliveryMode,

    /// Retry settings (immediate mode)
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Batch settings (batched mode)
    #[serde(default)]
    #[validate(nested)]
    pub batch: BatchConfig,
}

/// Per-item retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// Total attempts per reading (first try included)
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1, message = "max_retries must be >= 1"))]
    pub max_retries: u32,

    /// Backoff base in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_retries() -> u32 {
    MAX_RETRIES
}

fn default_backoff_base_ms() -> u64 {
    RETRY_BACKOFF_BASE_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff_base_ms: RETRY_BACKOFF_BASE_MS,
        }
    }
}

impl RetryConfig {
    /// Create retry configuration
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base_ms: millis_ceil(backoff_base),
        }
    }

    /// Backoff base as a duration
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Wait after failed attempt `attempt` (0-indexed): `base * 2^attempt`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base()
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Batch scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BatchConfig {
    /// Flush once the batch holds this many readings
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, message = "batch_size must be >= 1"))]
    pub batch_size: usize,

    /// Flush once this many milliseconds passed since the last flush
    #[serde(default = "default_batch_timeout_ms")]
    #[validate(range(min = 1, message = "batch_timeout_ms must be >= 1"))]
    pub batch_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    BATCH_SIZE
}

fn default_batch_timeout_ms() -> u64 {
    BATCH_TIMEOUT_MS
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            batch_timeout_ms: BATCH_TIMEOUT_MS,
        }
    }
}

impl BatchConfig {
    /// Create batch configuration
    pub fn new(batch_size: usize, batch_timeout: Duration) -> Self {
        Self {
            batch_size,
            batch_timeout_ms: millis_ceil(batch_timeout),
        }
    }

    /// Time threshold as a duration
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

/// Simulated sensor definition
///
/// Produces `count` readings with values `base_value + i * step`,
/// each available `delay_ms` after the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// Device id stamped on every reading
    #[validate(length(min = 1, message = "device_id cannot be empty"))]
    pub device_id: String,

    /// Pacing delay before each reading (ms)
    #[serde(default)]
    pub delay_ms: u64,

    /// Number of readings before end of stream
    #[serde(default = "default_count")]
    pub count: usize,

    /// Value of the first reading
    #[serde(default = "default_base_value")]
    pub base_value: f64,

    /// Increment between consecutive readings
    #[serde(default = "default_step")]
    pub step: f64,

    /// Fail instead of producing reading number `fail_after` (fault injection)
    #[serde(default)]
    pub fail_after: Option<usize>,
}

fn default_count() -> usize {
    5
}

fn default_base_value() -> f64 {
    20.0
}

fn default_step() -> f64 {
    0.5
}

impl SourceConfig {
    /// Sensor with default count/values and the given pacing
    pub fn new(device_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            device_id: device_id.into(),
            delay_ms: millis_ceil(delay),
            count: default_count(),
            base_value: default_base_value(),
            step: default_step(),
            fail_after: None,
        }
    }

    /// Pacing delay as a duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
