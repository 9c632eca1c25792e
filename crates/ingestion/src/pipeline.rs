//! Ingestion Pipeline main entry

use std::sync::Arc;

use async_channel::{unbounded, Receiver};
use contracts::{BoxedSource, Reading, ReadingHandoff};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::collector::{run_collector, ChannelHandoff, CollectorContext};
use crate::completion::{CompletionTracker, SourceState};
use crate::config::IngestionMetrics;
use crate::error::{IngestionError, Result};

/// Ingestion Pipeline
///
/// Owns the registered sources until started, then runs one collector task
/// per source. Sources are never restarted.
pub struct IngestionPipeline {
    /// Registered sources, in registration order
    sources: Vec<BoxedSource>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Stops all collectors
    cancel: CancellationToken,
}

impl IngestionPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a pipeline whose collectors stop when `cancel` fires
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            sources: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            cancel,
        }
    }

    /// Register a source
    #[instrument(name = "ingestion_register_source", skip_all, fields(source = %source.name()))]
    pub fn register_source(&mut self, source: BoxedSource) {
        debug!(index = self.sources.len(), "registered source");
        self.sources.push(source);
    }

    /// Register many sources
    pub fn register_sources(&mut self, sources: impl IntoIterator<Item = BoxedSource>) {
        for source in sources {
            self.register_source(source);
        }
    }

    /// Get registered source count
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Token that stops every collector of this pipeline
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start one collector per source, each with its own handoff
    ///
    /// `make_handoff(index, source_name)` is called once per source.
    #[instrument(name = "ingestion_start", skip_all, fields(sources = self.sources.len()))]
    pub fn start_with<H, F>(self, mut make_handoff: F) -> RunningIngestion
    where
        H: ReadingHandoff + 'static,
        F: FnMut(usize, &str) -> H,
    {
        let names: Vec<String> = self.sources.iter().map(|s| s.name().to_string()).collect();
        let tracker = Arc::new(CompletionTracker::new(names.clone()));

        info!(count = self.sources.len(), "starting collectors");

        let handles = self
            .sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| {
                let handoff = make_handoff(index, source.name());
                let ctx = CollectorContext {
                    index,
                    tracker: tracker.clone(),
                    metrics: self.metrics.clone(),
                    cancel: self.cancel.clone(),
                };
                tokio::spawn(run_collector(source, handoff, ctx))
            })
            .collect();

        RunningIngestion {
            names,
            tracker,
            handles,
            metrics: self.metrics,
        }
    }

    /// Start fan-in: every collector writes into one shared unbounded channel
    ///
    /// The channel closes once all collectors have stopped.
    pub fn start_fan_in(self) -> (RunningIngestion, Receiver<Reading>) {
        let (tx, rx) = unbounded();
        let running = self.start_with(|_, _| ChannelHandoff::new(tx.clone()));
        // Only collectors hold senders from here on.
        drop(tx);
        (running, rx)
    }
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to started collectors
pub struct RunningIngestion {
    names: Vec<String>,
    tracker: Arc<CompletionTracker>,
    handles: Vec<JoinHandle<SourceState>>,
    metrics: Arc<IngestionMetrics>,
}

impl RunningIngestion {
    /// Termination coordinator shared with the collectors
    pub fn tracker(&self) -> Arc<CompletionTracker> {
        self.tracker.clone()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Await every collector task
    ///
    /// Returns terminal states in registration order. A panicked collector is
    /// recorded as `Failed` and reported as an error after all tasks are joined.
    #[instrument(name = "ingestion_join", skip(self), fields(collectors = self.handles.len()))]
    pub async fn join(self) -> Result<Vec<SourceState>> {
        let mut states = Vec::with_capacity(self.handles.len());
        let mut panicked = None;

        for (index, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(state) => states.push(state),
                Err(e) => {
                    error!(source = %self.names[index], error = %e, "collector task panicked");
                    self.tracker.mark(index, SourceState::Failed);
                    states.push(SourceState::Failed);
                    panicked.get_or_insert_with(|| IngestionError::CollectorPanicked {
                        source_name: self.names[index].clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        match panicked {
            Some(err) => Err(err),
            None => Ok(states),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::SimulatedSensor;
    use contracts::{ContractError, ReadingSource, SourceConfig};
    use rand::Rng;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_pipeline_creation() {
        let pipeline = IngestionPipeline::new();
        assert_eq!(pipeline.source_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_fan_in_closes_immediately() {
        let (running, rx) = IngestionPipeline::new().start_fan_in();
        assert!(rx.recv().await.is_err());
        assert!(running.tracker().all_sources_finished());
        assert!(running.join().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fan_in_preserves_per_source_order() {
        let mut rng = rand::rng();
        let mut pipeline = IngestionPipeline::new();
        for i in 0..4 {
            let mut config = SourceConfig::new(
                format!("sensor_{i}"),
                Duration::from_millis(rng.random_range(0..4)),
            );
            config.count = 20;
            config.step = 1.0;
            pipeline.register_source(SimulatedSensor::new(config).boxed());
        }

        let (running, rx) = pipeline.start_fan_in();

        let mut per_device: HashMap<String, Vec<f64>> = HashMap::new();
        while let Ok(reading) = rx.recv().await {
            per_device.entry(reading.device_id).or_default().push(reading.value);
        }

        let states = running.join().await.unwrap();
        assert!(states.iter().all(|s| *s == SourceState::Done));
        assert_eq!(per_device.len(), 4);
        for values in per_device.values() {
            assert_eq!(values.len(), 20);
            assert!(values.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let mut faulty = SourceConfig::new("faulty", Duration::ZERO);
        faulty.fail_after = Some(1);

        let mut pipeline = IngestionPipeline::new();
        pipeline.register_source(SimulatedSensor::new(faulty).boxed());
        pipeline.register_source(SimulatedSensor::with_delay("healthy", Duration::from_millis(1)).boxed());

        let (running, rx) = pipeline.start_fan_in();
        let metrics = running.metrics();
        let mut received = Vec::new();
        while let Ok(reading) = rx.recv().await {
            received.push(reading.device_id);
        }

        let states = running.join().await.unwrap();
        assert_eq!(states, vec![SourceState::Failed, SourceState::Done]);
        assert_eq!(received.iter().filter(|d| *d == "healthy").count(), 5);
        assert_eq!(received.iter().filter(|d| *d == "faulty").count(), 1);
        assert_eq!(metrics.snapshot().source_failures, 1);
    }

    struct PanickingSource;

    #[async_trait::async_trait]
    impl ReadingSource for PanickingSource {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn next(&mut self) -> std::result::Result<Option<Reading>, ContractError> {
            panic!("source bug");
        }
    }

    #[tokio::test]
    async fn test_panicking_collector_reported_on_join() {
        let mut pipeline = IngestionPipeline::new();
        pipeline.register_source(Box::new(PanickingSource));
        pipeline.register_source(SimulatedSensor::with_delay("ok", Duration::ZERO).boxed());

        let (running, rx) = pipeline.start_fan_in();
        let tracker = running.tracker();
        let mut count = 0;
        while rx.recv().await.is_ok() {
            count += 1;
        }

        let err = running.join().await.unwrap_err();
        assert!(matches!(err, IngestionError::CollectorPanicked { .. }));
        assert_eq!(count, 5);
        assert!(tracker.all_sources_finished());
    }
}
