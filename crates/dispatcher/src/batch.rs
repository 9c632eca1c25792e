//! Batch scheduler
//!
//! Single consumer of the fan-in channel. A batch is flushed when it reaches
//! `batch_size`, when `batch_timeout` has elapsed since the last flush, and
//! once more (if non-empty) after every source has finished and the channel
//! is drained.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_channel::Receiver;
use contracts::{BatchConfig, DataSink, Reading};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use crate::metrics::SinkMetrics;

/// Why a batch left the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// `batch_size` reached
    Size,
    /// `batch_timeout` elapsed since the last flush
    Timeout,
    /// Final partial batch after all sources finished
    Drain,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Timeout => "timeout",
            FlushReason::Drain => "drain",
        }
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flushed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushRecord {
    pub size: usize,
    pub reason: FlushReason,
}

/// What the scheduler did over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Flushes in order
    pub flushes: Vec<FlushRecord>,
    /// Readings written successfully
    pub emitted: u64,
    /// Readings whose write failed (not retried at batch level)
    pub write_failures: u64,
}

impl BatchReport {
    /// Flush sizes in order
    pub fn flush_sizes(&self) -> Vec<usize> {
        self.flushes.iter().map(|f| f.size).collect()
    }

    /// Readings that went through a flush, written or not
    pub fn total_flushed(&self) -> usize {
        self.flushes.iter().map(|f| f.size).sum()
    }
}

/// Size/time bounded batcher writing into one sink
pub struct BatchScheduler<S> {
    config: BatchConfig,
    sink: S,
    metrics: Arc<SinkMetrics>,
}

impl<S: DataSink> BatchScheduler<S> {
    pub fn new(config: BatchConfig, sink: S) -> Self {
        Self::with_metrics(config, sink, Arc::new(SinkMetrics::new()))
    }

    pub fn with_metrics(config: BatchConfig, sink: S, metrics: Arc<SinkMetrics>) -> Self {
        Self {
            config,
            sink,
            metrics,
        }
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<SinkMetrics> {
        self.metrics.clone()
    }

    /// Consume `rx` until it is closed, or until `sources_finished` resolves
    /// and what is already queued has been taken
    ///
    /// The sink is flushed and closed before returning.
    #[instrument(
        name = "batch_scheduler",
        skip_all,
        fields(
            sink = %self.sink.name(),
            batch_size = self.config.batch_size,
            batch_timeout_ms = self.config.batch_timeout_ms
        )
    )]
    pub async fn run<F>(mut self, rx: Receiver<Reading>, sources_finished: F) -> BatchReport
    where
        F: Future<Output = ()>,
    {
        let batch_size = self.config.batch_size.max(1);
        let timeout = self.config.batch_timeout();
        let mut batch: Vec<Reading> = Vec::with_capacity(batch_size);
        let mut report = BatchReport::default();
        let mut last_flush = Instant::now();

        tokio::pin!(sources_finished);

        loop {
            let deadline = last_flush + timeout;
            tokio::select! {
                biased;
                received = rx.recv() => {
                    let Ok(reading) = received else {
                        debug!("channel closed");
                        break;
                    };
                    batch.push(reading);
                    if batch.len() >= batch_size {
                        self.flush(&mut batch, FlushReason::Size, &mut report).await;
                        last_flush = Instant::now();
                    } else if last_flush.elapsed() >= timeout {
                        self.flush(&mut batch, FlushReason::Timeout, &mut report).await;
                        last_flush = Instant::now();
                    }
                }
                _ = &mut sources_finished => {
                    debug!(queued = rx.len(), "all sources finished");
                    break;
                }
                // Armed only while a batch is pending; `last_flush` moves on real flushes only.
                _ = sleep_until(deadline), if !batch.is_empty() => {
                    self.flush(&mut batch, FlushReason::Timeout, &mut report).await;
                    last_flush = Instant::now();
                }
            }
        }

        // Collectors are done; whatever is still queued belongs to the final batches.
        while let Ok(reading) = rx.try_recv() {
            batch.push(reading);
            if batch.len() >= batch_size {
                self.flush(&mut batch, FlushReason::Size, &mut report).await;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, FlushReason::Drain, &mut report).await;
        }

        if let Err(e) = self.sink.flush().await {
            warn!(error = %e, "sink flush failed");
        }
        if let Err(e) = self.sink.close().await {
            warn!(error = %e, "sink close failed");
        }

        info!(
            flushes = report.flushes.len(),
            emitted = report.emitted,
            write_failures = report.write_failures,
            "batch scheduler drained"
        );
        report
    }

    async fn flush(&mut self, batch: &mut Vec<Reading>, reason: FlushReason, report: &mut BatchReport) {
        let size = batch.len();
        debug!(size, reason = %reason, "flushing batch");

        for reading in batch.drain(..) {
            match self.sink.write(&reading).await {
                Ok(()) => {
                    self.metrics.inc_write_count();
                    report.emitted += 1;
                }
                Err(e) => {
                    self.metrics.inc_failure_count();
                    report.write_failures += 1;
                    warn!(device_id = %reading.device_id, error = %e, "batch write failed, dropping reading");
                }
            }
        }

        self.metrics.inc_batch_count();
        observability::record_batch_flushed(size, reason.as_str());
        report.flushes.push(FlushRecord { size, reason });
    }
}
