//! Completion tracking for collector tasks
//!
//! Each source reports exactly one terminal state. The finished count is
//! published on a `watch` channel so consumers can await "all sources
//! finished" instead of polling task handles.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

/// Lifecycle of one source as seen by its collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Collector still pulling
    Running,
    /// End of stream reached
    Done,
    /// `next()` returned an error; remaining output is lost
    Failed,
    /// Stopped by cancellation or a closed downstream
    Cancelled,
}

impl SourceState {
    /// Whether this is a terminal state
    pub fn is_finished(self) -> bool {
        !matches!(self, SourceState::Running)
    }

    /// Label for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            SourceState::Running => "running",
            SourceState::Done => "done",
            SourceState::Failed => "failed",
            SourceState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the terminal state of every registered source
#[derive(Debug)]
pub struct CompletionTracker {
    names: Vec<String>,
    states: Mutex<Vec<SourceState>>,
    finished: watch::Sender<usize>,
}

impl CompletionTracker {
    /// Create a tracker with every source `Running`
    pub fn new(names: Vec<String>) -> Self {
        let states = vec![SourceState::Running; names.len()];
        let (finished, _) = watch::channel(0);
        Self {
            names,
            states: Mutex::new(states),
            finished,
        }
    }

    /// Number of tracked sources
    pub fn total(&self) -> usize {
        self.names.len()
    }

    /// Number of sources in a terminal state
    pub fn finished(&self) -> usize {
        *self.finished.borrow()
    }

    /// Whether every source reached a terminal state
    pub fn all_sources_finished(&self) -> bool {
        self.finished() >= self.total()
    }

    /// Record the terminal state of source `index`
    ///
    /// The first terminal state wins. Returns `true` if this call finished the source.
    pub fn mark(&self, index: usize, state: SourceState) -> bool {
        if !state.is_finished() {
            return false;
        }

        let mut states = self.lock_states();
        let Some(slot) = states.get_mut(index) else {
            return false;
        };
        if slot.is_finished() {
            return false;
        }
        *slot = state;

        // Counter moves under the same lock as the flag.
        self.finished.send_modify(|n| *n += 1);
        let finished = *self.finished.borrow();

        debug!(
            source = %self.names[index],
            state = %state,
            finished,
            total = self.total(),
            "source finished"
        );
        observability::record_source_finished(
            &self.names[index],
            state.as_str(),
            finished,
            self.total(),
        );
        true
    }

    /// Wait until every source reached a terminal state
    pub async fn wait_all_finished(&self) {
        let total = self.total();
        let mut rx = self.finished.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n >= total).await;
    }

    /// State of source `index`
    pub fn state(&self, index: usize) -> Option<SourceState> {
        self.lock_states().get(index).copied()
    }

    /// Snapshot of `(name, state)` per source, in registration order
    pub fn states(&self) -> Vec<(String, SourceState)> {
        let states = self.lock_states();
        self.names.iter().cloned().zip(states.iter().copied()).collect()
    }

    /// Number of sources in `state`
    pub fn count(&self, state: SourceState) -> usize {
        self.lock_states().iter().filter(|s| **s == state).count()
    }

    fn lock_states(&self) -> MutexGuard<'_, Vec<SourceState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
