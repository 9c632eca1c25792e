//! ReadingHandoff trait - where a collector delivers what it pulls

use crate::Reading;

/// Downstream of a single collector task
///
/// Implemented by the shared fan-in channel (batched mode) and by the
/// per-item retry forwarder (immediate mode).
#[trait_variant::make(ReadingHandoff: Send)]
pub trait LocalReadingHandoff {
    /// Deliver one reading
    ///
    /// Returns `false` when downstream is gone and the collector should stop.
    async fn hand_off(&mut self, reading: Reading) -> bool;
}
