//! # Ingestion Pipeline
//!
//! Concurrent multi-source ingestion.
//!
//! Responsibilities:
//! - Register pull-based reading sources (simulated or external)
//! - Run one collector task per source, preserving each source's order
//! - Isolate source failures from sibling sources
//! - Track per-source completion for drain decisions
//!
//! ## Usage Example (Fan-in)
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, SimulatedSensor};
//! use std::time::Duration;
//!
//! let mut pipeline = IngestionPipeline::new();
//! pipeline.register_source(SimulatedSensor::with_delay("sensor_1", Duration::from_millis(300)).boxed());
//! pipeline.register_source(SimulatedSensor::with_delay("sensor_2", Duration::from_millis(500)).boxed());
//!
//! let (running, rx) = pipeline.start_fan_in();
//! while let Ok(reading) = rx.recv().await {
//!     println!("{reading}");
//! }
//! running.join().await?;
//! ```

mod collector;
mod completion;
mod config;
mod error;
mod mock;
mod pipeline;

// Re-exports
pub use collector::{run_collector, ChannelHandoff, CollectorContext};
pub use completion::{CompletionTracker, SourceState};
pub use config::{IngestionMetrics, MetricsSnapshot};
pub use contracts::Reading;
pub use error::{IngestionError, Result};
pub use mock::SimulatedSensor;
pub use pipeline::{IngestionPipeline, RunningIngestion};
