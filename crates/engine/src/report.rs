//! Run statistics.

use std::time::Duration;

use contracts::DeliveryMode;
use dispatcher::FlushRecord;
use ingestion::SourceState;
use observability::{RunningStats, StatsSummary};

/// Statistics from one engine run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Delivery mode the run used
    pub mode: DeliveryMode,

    /// Readings pulled from all sources
    pub readings_received: u64,

    /// Readings written to the sink
    pub delivered: u64,

    /// Readings dropped after the last retry failed (immediate mode)
    pub abandoned: u64,

    /// Failed write attempts
    pub write_failures: u64,

    /// Backoff sleeps taken (immediate mode)
    pub retries: u64,

    /// Flushed batches in order (batched mode)
    pub flushes: Vec<FlushRecord>,

    /// Final state per source, in registration order
    pub sources: Vec<(String, SourceState)>,

    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// Flush sizes in order
    pub fn flush_sizes(&self) -> Vec<usize> {
        self.flushes.iter().map(|f| f.size).collect()
    }

    /// Number of sources that ended in `state`
    pub fn sources_in(&self, state: SourceState) -> usize {
        self.sources.iter().filter(|(_, s)| *s == state).count()
    }

    /// Delivered readings per second
    pub fn throughput(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.delivered as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Batch size distribution
    pub fn batch_stats(&self) -> StatsSummary {
        let mut stats = RunningStats::default();
        for flush in &self.flushes {
            stats.push(flush.size as f64);
        }
        StatsSummary::from(&stats)
    }

    /// Print summary to stderr; stdout carries the readings
    pub fn print_summary(&self) {
        eprintln!("\n=== Run Summary ({:?}) ===", self.mode);
        eprintln!("   ├─ Duration: {:.2}s", self.elapsed.as_secs_f64());
        eprintln!("   ├─ Readings received: {}", self.readings_received);
        eprintln!("   ├─ Delivered: {}", self.delivered);
        eprintln!("   ├─ Abandoned: {}", self.abandoned);
        eprintln!("   ├─ Write failures: {}", self.write_failures);
        eprintln!("   ├─ Retries: {}", self.retries);
        eprintln!("   └─ Throughput: {:.2} readings/s", self.throughput());

        if !self.flushes.is_empty() {
            eprintln!("\nBatches");
            eprintln!("   ├─ Flushes: {}", self.flushes.len());
            eprintln!("   ├─ Sizes: {:?}", self.flush_sizes());
            eprintln!("   └─ Size stats: {}", self.batch_stats());
        }

        if !self.sources.is_empty() {
            eprintln!("\nSources");
            for (name, state) in &self.sources {
                eprintln!("   ├─ {}: {}", name, state);
            }
        }

        eprintln!();
    }
}
