//! Server timestamps

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Strictly increasing timestamp source
///
/// Follows the wall clock but never repeats or goes backwards, so two writes
/// landing in the same millisecond still get distinct, ordered timestamps.
#[derive(Debug, Default)]
pub struct ServerClock {
    last: i64,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next timestamp
    pub fn tick(&mut self) -> i64 {
        let ts = now_ms().max(self.last + 1);
        self.last = ts;
        ts
    }
}
