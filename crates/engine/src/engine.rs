//! Stream engine - wires sources, collectors and delivery together.
//!
//! Immediate mode: every collector hands its readings straight to the retry
//! pipeline, all sources sharing one sink.
//! Batched mode: collectors fan in to one channel consumed by the batch scheduler.

use std::sync::Arc;
use std::time::Duration;

use contracts::{BatchConfig, BoxedSource, DataSink, DeliveryMode, EngineConfig};
use dispatcher::{BatchScheduler, RetryForwarder, RetryPolicy, SinkMetrics};
use ingestion::IngestionPipeline;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{EngineError, Result};
use crate::report::RunReport;

/// Concurrent multi-source ingestion engine
#[derive(Debug, Clone)]
pub struct StreamEngine {
    config: EngineConfig,
    cancel: CancellationToken,
}

impl StreamEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Engine whose runs stop pulling sources when `cancel` fires
    pub fn with_cancellation(config: EngineConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that cancels in-progress runs
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run in the configured delivery mode
    pub async fn run<S>(&self, sources: Vec<BoxedSource>, sink: S) -> Result<RunReport>
    where
        S: DataSink + 'static,
    {
        match self.config.mode {
            DeliveryMode::Immediate => self.run_immediate(sources, sink).await,
            DeliveryMode::Batched => self.run_batched(sources, sink).await,
        }
    }

    /// Deliver every reading as soon as it is pulled, with per-item retry
    ///
    /// Returns once every collector has stopped and its last reading was
    /// delivered or abandoned.
    #[instrument(name = "engine_run_immediate", skip_all, fields(sources = sources.len()))]
    pub async fn run_immediate<S>(&self, sources: Vec<BoxedSource>, sink: S) -> Result<RunReport>
    where
        S: DataSink + 'static,
    {
        let start = Instant::now();
        let sink_metrics = Arc::new(SinkMetrics::new());
        let policy = RetryPolicy::with_metrics(self.config.retry.clone(), sink_metrics.clone());
        let sink = Arc::new(Mutex::new(sink));

        let mut pipeline = IngestionPipeline::with_cancellation(self.cancel.clone());
        pipeline.register_sources(sources);
        info!(
            sources = pipeline.source_count(),
            max_retries = self.config.retry.max_retries,
            "starting immediate run"
        );

        let running = pipeline
            .start_with(|_, name| RetryForwarder::new(policy.clone(), sink.clone(), name));
        let (tracker, ingestion_metrics) = (running.tracker(), running.metrics());
        let joined = running.join().await;

        {
            let mut sink = sink.lock().await;
            finish_sink(&mut *sink).await;
        }
        joined?;

        let sink_snapshot = sink_metrics.snapshot();
        let report = RunReport {
            mode: DeliveryMode::Immediate,
            readings_received: ingestion_metrics.snapshot().readings_received,
            delivered: sink_snapshot.write_count,
            abandoned: sink_snapshot.abandoned_count,
            write_failures: sink_snapshot.failure_count,
            retries: sink_snapshot.retry_count,
            flushes: Vec::new(),
            sources: tracker.states(),
            elapsed: start.elapsed(),
        };
        log_finished(&report);
        Ok(report)
    }

    /// Collect every source into one channel and deliver in size/time bounded batches
    ///
    /// Returns once every collector has stopped and the final partial batch is flushed.
    #[instrument(name = "engine_run_batched", skip_all, fields(sources = sources.len()))]
    pub async fn run_batched<S>(&self, sources: Vec<BoxedSource>, sink: S) -> Result<RunReport>
    where
        S: DataSink + 'static,
    {
        let start = Instant::now();
        let sink_metrics = Arc::new(SinkMetrics::new());

        let mut pipeline = IngestionPipeline::with_cancellation(self.cancel.clone());
        pipeline.register_sources(sources);
        info!(
            sources = pipeline.source_count(),
            batch_size = self.config.batch.batch_size,
            batch_timeout_ms = self.config.batch.batch_timeout_ms,
            "starting batched run"
        );

        let (running, rx) = pipeline.start_fan_in();
        let (tracker, ingestion_metrics) = (running.tracker(), running.metrics());

        let scheduler =
            BatchScheduler::with_metrics(self.config.batch.clone(), sink, sink_metrics.clone());
        let sources_finished = {
            let tracker = tracker.clone();
            async move { tracker.wait_all_finished().await }
        };
        let scheduler_task = tokio::spawn(scheduler.run(rx, sources_finished));

        let joined = running.join().await;
        let batch = scheduler_task
            .await
            .map_err(|e| EngineError::task_panicked("batch scheduler", e.to_string()))?;
        joined?;

        let sink_snapshot = sink_metrics.snapshot();
        let report = RunReport {
            mode: DeliveryMode::Batched,
            readings_received: ingestion_metrics.snapshot().readings_received,
            delivered: batch.emitted,
            abandoned: 0,
            write_failures: sink_snapshot.failure_count,
            retries: 0,
            flushes: batch.flushes,
            sources: tracker.states(),
            elapsed: start.elapsed(),
        };
        log_finished(&report);
        Ok(report)
    }
}

/// Run every source with default retry settings, delivering each reading immediately
pub async fn run_immediate<S>(sources: Vec<BoxedSource>, sink: S) -> Result<RunReport>
where
    S: DataSink + 'static,
{
    StreamEngine::new(EngineConfig::default())
        .run_immediate(sources, sink)
        .await
}

/// Run every source through a batch scheduler with the given thresholds
pub async fn run_batched<S>(
    sources: Vec<BoxedSource>,
    sink: S,
    batch_size: usize,
    batch_timeout: Duration,
) -> Result<RunReport>
where
    S: DataSink + 'static,
{
    let config = EngineConfig {
        mode: DeliveryMode::Batched,
        batch: BatchConfig::new(batch_size, batch_timeout),
        ..Default::default()
    };
    StreamEngine::new(config).run_batched(sources, sink).await
}

async fn finish_sink<S: DataSink>(sink: &mut S) {
    if let Err(e) = sink.flush().await {
        warn!(sink = %sink.name(), error = %e, "sink flush failed");
    }
    if let Err(e) = sink.close().await {
        warn!(sink = %sink.name(), error = %e, "sink close failed");
    }
}

fn log_finished(report: &RunReport) {
    info!(
        mode = ?report.mode,
        received = report.readings_received,
        delivered = report.delivered,
        abandoned = report.abandoned,
        flushes = report.flushes.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::{ContractError, Reading, ReadingSource, RetryConfig, SourceConfig};
    use dispatcher::{FlushReason, MemorySink};
    use ingestion::{SimulatedSensor, SourceState};

    fn sensors(ids: &[&str], delay: Duration) -> Vec<BoxedSource> {
        ids.iter()
            .map(|id| SimulatedSensor::with_delay(id, delay).boxed())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_delivers_all() {
        let sink = MemorySink::new("mem");
        let report = run_immediate(
            sensors(&["sensor_1", "sensor_2", "sensor_3"], Duration::from_millis(300)),
            sink.clone(),
        )
        .await
        .unwrap();

        assert_eq!(sink.len(), 15);
        assert_eq!(report.delivered, 15);
        assert_eq!(report.readings_received, 15);
        assert_eq!(report.sources_in(SourceState::Done), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_retry_budget_from_config() {
        let sink = MemorySink::new("mem");
        sink.fail_device("flaky");
        let config = EngineConfig {
            retry: RetryConfig::new(2, Duration::from_millis(10)),
            ..Default::default()
        };

        let report = StreamEngine::new(config)
            .run_immediate(sensors(&["flaky"], Duration::ZERO), sink.clone())
            .await
            .unwrap();

        assert_eq!(report.abandoned, 5);
        assert_eq!(report.delivered, 0);
        assert_eq!(sink.attempts(), 10);
        assert_eq!(report.retries, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_flush_sizes() {
        let sink = MemorySink::new("mem");
        let report = run_batched(
            sensors(&["sensor_1"], Duration::from_millis(10)),
            sink.clone(),
            2,
            Duration::from_secs(1000),
        )
        .await
        .unwrap();

        assert_eq!(report.flush_sizes(), vec![2, 2, 1]);
        assert_eq!(report.flushes[2].reason, FlushReason::Drain);
        assert_eq!(report.delivered, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_dispatches_on_mode() {
        let config = EngineConfig {
            mode: DeliveryMode::Batched,
            ..Default::default()
        };
        let report = StreamEngine::new(config)
            .run(sensors(&["a", "b"], Duration::ZERO), MemorySink::new("mem"))
            .await
            .unwrap();
        assert_eq!(report.mode, DeliveryMode::Batched);
        assert_eq!(report.delivered, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_sources_and_drains() {
        let mut slow = SourceConfig::new("slow", Duration::from_secs(1));
        slow.count = 1000;
        let sink = MemorySink::new("mem");
        let engine = StreamEngine::new(EngineConfig {
            mode: DeliveryMode::Batched,
            batch: BatchConfig::new(100, Duration::from_secs(1000)),
            ..Default::default()
        });

        let cancel = engine.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            cancel.cancel();
        });

        let report = engine
            .run(vec![SimulatedSensor::new(slow).boxed()], sink.clone())
            .await
            .unwrap();

        assert_eq!(report.sources, vec![("slow".to_string(), SourceState::Cancelled)]);
        assert_eq!(sink.len(), 3);
        assert_eq!(report.flush_sizes(), vec![3]);
    }

    struct PanickingSource;

    #[async_trait]
    impl ReadingSource for PanickingSource {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn next(&mut self) -> std::result::Result<Option<Reading>, ContractError> {
            panic!("source bug");
        }
    }

    #[tokio::test]
    async fn test_panicking_collector_is_fatal() {
        let sink = MemorySink::new("mem");
        let mut sources = sensors(&["ok"], Duration::ZERO);
        sources.push(Box::new(PanickingSource));

        let err = run_immediate(sources, sink.clone()).await.unwrap_err();

        assert!(matches!(err, EngineError::TaskPanicked { .. }));
        assert_eq!(sink.len(), 5);
    }
}
