//! Framerate History
//!
//! A fixed-size ring of recent frame periods. The reported statistic is
//! `1000 / average_period_ms`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling window of frame periods
#[derive(Debug, Clone)]
pub struct FramerateHistory {
    periods: VecDeque<Duration>,
    capacity: usize,
    last_start: Option<Instant>,
}

impl FramerateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            periods: VecDeque::with_capacity(capacity),
            capacity,
            last_start: None,
        }
    }

    /// Record the start of a frame; the first call only sets the reference
    pub fn mark(&mut self, now: Instant) {
        if let Some(last) = self.last_start {
            self.record(now.saturating_duration_since(last));
        }
        self.last_start = Some(now);
    }

    /// Push one period, evicting the oldest when full
    pub fn record(&mut self, period: Duration) {
        if self.periods.len() == self.capacity {
            self.periods.pop_front();
        }
        self.periods.push_back(period);
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Mean of the recorded periods in milliseconds
    pub fn average_period_ms(&self) -> Option<f64> {
        if self.periods.is_empty() {
            return None;
        }
        let total: f64 = self.periods.iter().map(|p| p.as_secs_f64() * 1000.0).sum();
        Some(total / self.periods.len() as f64)
    }

    /// Frames per second over the window, 0 before two frames were seen
    pub fn framerate(&self) -> f64 {
        match self.average_period_ms() {
            Some(avg) if avg > 0.0 => 1000.0 / avg,
            _ => 0.0,
        }
    }
}
