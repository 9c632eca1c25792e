//! Collector task: drains one source into its handoff
//!
//! One collector runs per source. It preserves the source's emission order,
//! never retries a failing source, and reports exactly one terminal state.

use std::sync::Arc;

use async_channel::Sender;
use contracts::{BoxedSource, Reading, ReadingHandoff};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::completion::{CompletionTracker, SourceState};
use crate::config::IngestionMetrics;

/// Handoff into the shared fan-in channel
#[derive(Debug, Clone)]
pub struct ChannelHandoff {
    tx: Sender<Reading>,
}

impl ChannelHandoff {
    /// Wrap a channel sender
    pub fn new(tx: Sender<Reading>) -> Self {
        Self { tx }
    }
}

impl ReadingHandoff for ChannelHandoff {
    async fn hand_off(&mut self, reading: Reading) -> bool {
        self.tx.send(reading).await.is_ok()
    }
}

/// Everything a collector needs besides its source and handoff
#[derive(Debug, Clone)]
pub struct CollectorContext {
    /// Index of the source in the tracker
    pub index: usize,
    /// Termination coordinator
    pub tracker: Arc<CompletionTracker>,
    /// Shared ingestion counters
    pub metrics: Arc<IngestionMetrics>,
    /// Stops the collector between pulls
    pub cancel: CancellationToken,
}

/// Pull `source` until it ends, fails, or is cancelled
///
/// Returns the terminal state, which is also recorded in the tracker.
#[instrument(
    name = "ingestion_collector",
    skip_all,
    fields(source = %source.name(), index = ctx.index)
)]
pub async fn run_collector<H: ReadingHandoff>(
    mut source: BoxedSource,
    mut handoff: H,
    ctx: CollectorContext,
) -> SourceState {
    debug!("collector started");
    let mut forwarded: u64 = 0;

    let state = loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break SourceState::Cancelled,
            next = source.next() => next,
        };

        match next {
            Ok(Some(reading)) => {
                ctx.metrics.record_received();
                observability::record_reading_received(source.name());
                trace!(device_id = %reading.device_id, value = reading.value, "reading pulled");

                if !handoff.hand_off(reading).await {
                    ctx.metrics.record_rejected();
                    warn!("downstream closed, stopping collector");
                    break SourceState::Cancelled;
                }
                forwarded += 1;
            }
            Ok(None) => break SourceState::Done,
            Err(e) => {
                ctx.metrics.record_source_failure();
                warn!(error = %e, forwarded, "source failed, remaining output lost");
                break SourceState::Failed;
            }
        }
    };

    ctx.tracker.mark(ctx.index, state);
    debug!(state = %state, forwarded, "collector stopped");
    state
}
