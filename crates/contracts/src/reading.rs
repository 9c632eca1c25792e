//! Reading - the unit of data flowing through the engine

use std::fmt;

use serde::{Deserialize, Serialize};

/// One sensor reading
///
/// Immutable once produced. Moves by value from source to collector,
/// through the shared channel, into the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Unix timestamp (seconds)
    pub timestamp: i64,

    /// Producing device
    pub device_id: String,

    /// Measured value
    pub value: f64,
}

impl Reading {
    /// Create a reading with an explicit timestamp
    pub fn new(timestamp: i64, device_id: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            device_id: device_id.into(),
            value,
        }
    }

    /// Create a reading stamped with the current unix time
    pub fn now(device_id: impl Into<String>, value: f64) -> Self {
        Self::new(chrono::Utc::now().timestamp(), device_id, value)
    }

    /// Render the emission line: `<device_id>: value=<value:.1>`
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: value={:.1}", self.device_id, self.value)
    }
}
