//! Stopwatch for timing live study sessions.
//!
//! Elapsed time is always re-derived from the stored resume timestamp rather
//! than counted tick by tick, so pausing stops the clock exactly and a
//! client that reloads mid-session still sees the right total.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stopwatch {
    pub running: bool,
    pub accumulated_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_resume: Option<DateTime<Utc>>,
}

impl Stopwatch {
    /// Starts (or resumes) the stopwatch. Starting a running stopwatch is a
    /// no-op.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if !self.running {
            self.running = true;
            self.last_resume = Some(now);
        }
    }

    /// Pauses the stopwatch, folding the current segment into the
    /// accumulated total. Pausing a paused stopwatch is a no-op.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.running {
            self.accumulated_seconds += self.current_segment(now);
            self.running = false;
            self.last_resume = None;
        }
    }

    pub fn reset(&mut self) {
        *self = Stopwatch::default();
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.accumulated_seconds + self.current_segment(now)
    }

    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        self.elapsed_seconds(now) as f64 / 3600.0
    }

    fn current_segment(&self, now: DateTime<Utc>) -> i64 {
        match (self.running, self.last_resume) {
            (true, Some(resumed)) => (now - resumed).num_seconds().max(0),
            _ => 0,
        }
    }
}

/// Per-user stopwatches held in process memory for the server's lifetime.
#[derive(Debug, Default)]
pub struct StopwatchRegistry {
    inner: RwLock<HashMap<String, Stopwatch>>,
}

impl StopwatchRegistry {
    pub fn with<R>(&self, user_id: &str, f: impl FnOnce(&mut Stopwatch) -> R) -> R {
        let mut map = self.inner.write().unwrap();
        f(map.entry(user_id.to_string()).or_default())
    }

    pub fn snapshot(&self, user_id: &str) -> Stopwatch {
        self.inner
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}
