//! Per-item retry with exponential backoff
//!
//! Attempt `k` (0-indexed) that fails waits `base * 2^k` before attempt `k + 1`.
//! Retry state is local to one `process` call.

use std::sync::Arc;

use contracts::{DataSink, Reading, ReadingHandoff, RetryConfig};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::metrics::SinkMetrics;

/// Result of processing one reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Emitted exactly once after `attempts` tries
    Delivered { attempts: u32 },
    /// Every attempt failed; the reading is dropped
    Abandoned { attempts: u32, error: String },
}

impl RetryOutcome {
    /// Whether the reading was emitted
    pub fn is_delivered(&self) -> bool {
        matches!(self, RetryOutcome::Delivered { .. })
    }

    /// Attempts spent on the reading
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Delivered { attempts } | RetryOutcome::Abandoned { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Retry policy bound to a sink's metrics
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    metrics: Arc<SinkMetrics>,
}

impl RetryPolicy {
    /// Create a policy with its own metrics
    pub fn new(config: RetryConfig) -> Self {
        Self::with_metrics(config, Arc::new(SinkMetrics::new()))
    }

    /// Create a policy recording into shared metrics
    pub fn with_metrics(config: RetryConfig, metrics: Arc<SinkMetrics>) -> Self {
        Self { config, metrics }
    }

    /// Retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Write `reading` to `sink`, retrying failed attempts with backoff
    ///
    /// The sink lock is held for a single attempt only, never across a backoff sleep.
    pub async fn process<S: DataSink>(&self, sink: &Mutex<S>, reading: &Reading) -> RetryOutcome {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            let (sink_name, result) = {
                let mut guard = sink.lock().await;
                let result = guard.write(reading).await;
                (guard.name().to_string(), result)
            };

            match result {
                Ok(()) => {
                    self.metrics.inc_write_count();
                    observability::record_reading_delivered(&sink_name, attempt + 1);
                    return RetryOutcome::Delivered {
                        attempts: attempt + 1,
                    };
                }
                Err(e) if attempt + 1 < max_attempts => {
                    let backoff = self.config.backoff_for(attempt);
                    self.metrics.inc_failure_count();
                    self.metrics.inc_retry_count();
                    observability::record_retry(&sink_name, backoff.as_millis() as u64);
                    warn!(
                        sink = %sink_name,
                        device_id = %reading.device_id,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "write failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.metrics.inc_failure_count();
                    self.metrics.inc_abandoned_count();
                    observability::record_reading_abandoned(&sink_name, &reading.device_id);
                    error!(
                        sink = %sink_name,
                        device_id = %reading.device_id,
                        attempts = attempt + 1,
                        error = %e,
                        "failed to process reading, abandoning"
                    );
                    return RetryOutcome::Abandoned {
                        attempts: attempt + 1,
                        error: e.to_string(),
                    };
                }
            }
        }
    }
}

/// Immediate-mode handoff: each reading goes straight through the retry policy
///
/// One forwarder per source, all sharing the same sink.
pub struct RetryForwarder<S> {
    policy: RetryPolicy,
    sink: Arc<Mutex<S>>,
    source_name: String,
    consecutive_abandoned: u32,
}

impl<S: DataSink> RetryForwarder<S> {
    /// Create a forwarder for `source_name`
    pub fn new(policy: RetryPolicy, sink: Arc<Mutex<S>>, source_name: impl Into<String>) -> Self {
        Self {
            policy,
            sink,
            source_name: source_name.into(),
            consecutive_abandoned: 0,
        }
    }

    /// Readings abandoned in a row for this source (informational only)
    pub fn consecutive_abandoned(&self) -> u32 {
        self.consecutive_abandoned
    }
}

impl<S: DataSink + 'static> ReadingHandoff for RetryForwarder<S> {
    async fn hand_off(&mut self, reading: Reading) -> bool {
        let outcome = self.policy.process(&self.sink, &reading).await;
        if outcome.is_delivered() {
            self.consecutive_abandoned = 0;
        } else {
            self.consecutive_abandoned += 1;
            warn!(
                source = %self.source_name,
                consecutive_abandoned = self.consecutive_abandoned,
                "source has abandoned readings"
            );
        }
        // Abandoned readings are dropped, the source keeps flowing.
        true
    }
}
