// clock.rs — Current time and ISO timestamp parsing behind one trait.
//
// The orchestrator compares run timestamps against the last recorded
// activity, the policy engine stamps decisions, and the review store stamps
// requests. All of them go through `Clock` so tests can pin time.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::error::ClockError;

/// A source of the current instant.
///
/// `Send + Sync` because one clock is shared by every component built at
/// startup.
pub trait Clock: Send + Sync {
    /// The current instant (UTC).
    fn now(&self) -> DateTime<Utc>;

    /// Parse an ISO 8601 / RFC 3339 timestamp into a UTC instant.
    fn parse_iso(&self, text: &str) -> Result<DateTime<Utc>, ClockError> {
        DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|source| ClockError::InvalidTimestamp {
                input: text.to_string(),
                source,
            })
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward, with a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = *current + by;
    }

    /// Jump to an exact instant.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
