//! MemorySink - captures rendered lines in memory
//!
//! Clones share the same buffer, so a caller can keep one handle while the
//! engine owns another. Failures can be scripted to exercise retry paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, DataSink, Reading};

#[derive(Debug, Default)]
struct Shared {
    lines: Mutex<Vec<String>>,
    failing_devices: Mutex<HashSet<String>>,
    fail_next: AtomicUsize,
    attempts: AtomicU64,
}

/// In-memory sink
#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    shared: Arc<Shared>,
}

impl MemorySink {
    /// Create an empty MemorySink
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Fail the next `n` write attempts, whatever the reading
    pub fn fail_next(&self, n: usize) {
        self.shared.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every write attempt for `device_id`
    pub fn fail_device(&self, device_id: impl Into<String>) {
        lock(&self.shared.failing_devices).insert(device_id.into());
    }

    /// Lines emitted so far, in emission order
    pub fn lines(&self) -> Vec<String> {
        lock(&self.shared.lines).clone()
    }

    /// Number of lines emitted so far
    pub fn len(&self) -> usize {
        lock(&self.shared.lines).len()
    }

    /// Whether nothing was emitted yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write attempts, failed ones included
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    fn should_fail(&self, reading: &Reading) -> bool {
        let scripted = self
            .shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        scripted || lock(&self.shared.failing_devices).contains(&reading.device_id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DataSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, reading: &Reading) -> Result<(), ContractError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(reading) {
            return Err(ContractError::sink_write(
                &self.name,
                format!("scripted failure for {}", reading.device_id),
            ));
        }
        lock(&self.shared.lines).push(reading.render());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_buffer() {
        let handle = MemorySink::new("mem");
        let mut sink = handle.clone();

        sink.write(&Reading::new(0, "sensor_1", 23.456)).await.unwrap();

        assert_eq!(handle.lines(), vec!["sensor_1: value=23.5"]);
        assert_eq!(handle.attempts(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_counts_down() {
        let mut sink = MemorySink::new("mem");
        sink.fail_next(2);
        let reading = Reading::new(0, "sensor_1", 1.0);

        assert!(sink.write(&reading).await.is_err());
        assert!(sink.write(&reading).await.is_err());
        assert!(sink.write(&reading).await.is_ok());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.attempts(), 3);
    }

    #[tokio::test]
    async fn test_fail_device() {
        let mut sink = MemorySink::new("mem");
        sink.fail_device("bad");

        assert!(sink.write(&Reading::new(0, "bad", 1.0)).await.is_err());
        assert!(sink.write(&Reading::new(0, "good", 1.0)).await.is_ok());
        assert_eq!(sink.lines(), vec!["good: value=1.0"]);
    }
}
