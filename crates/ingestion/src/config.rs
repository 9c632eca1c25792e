//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
///
/// Shared by all collector tasks of one pipeline.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total readings pulled from sources
    pub readings_received: AtomicU64,

    /// Readings refused by a closed downstream
    pub readings_rejected: AtomicU64,

    /// Sources that failed mid-stream
    pub source_failures: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record reading received
    pub fn record_received(&self) {
        self.readings_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record reading rejected by downstream
    pub fn record_rejected(&self) {
        self.readings_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record source failure
    pub fn record_source_failure(&self) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            readings_received: self.readings_received.load(Ordering::Relaxed),
            readings_rejected: self.readings_rejected.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total readings pulled from sources
    pub readings_received: u64,

    /// Readings refused by a closed downstream
    pub readings_rejected: u64,

    /// Sources that failed mid-stream
    pub source_failures: u64,
}
