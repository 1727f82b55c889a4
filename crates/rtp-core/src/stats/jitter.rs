//! Inter-arrival jitter
//!
//! Jitter here is the population standard deviation of the most recent
//! wall-clock gaps between received packets, in milliseconds. It is not the
//! RFC 3550 transit-time estimator; RTP timestamps are not consulted.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window of inter-arrival gaps
#[derive(Debug, Clone)]
pub struct ArrivalJitter {
    capacity: usize,
    gaps: VecDeque<f64>,
    last_arrival: Option<Instant>,
}

impl ArrivalJitter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            gaps: VecDeque::with_capacity(capacity),
            last_arrival: None,
        }
    }

    /// Record a packet arrival
    pub fn on_arrival(&mut self, at: Instant) {
        if let Some(prev) = self.last_arrival {
            self.push_gap(at.saturating_duration_since(prev));
        }
        self.last_arrival = Some(at);
    }

    /// Record a gap directly
    pub fn push_gap(&mut self, gap: Duration) {
        if self.gaps.len() == self.capacity {
            self.gaps.pop_front();
        }
        self.gaps.push_back(gap.as_secs_f64());
    }

    /// Standard deviation of the window in milliseconds; 0 below two gaps
    pub fn jitter_ms(&self) -> f64 {
        let n = self.gaps.len();
        if n < 2 {
            return 0.0;
        }

        let mean = self.gaps.iter().sum::<f64>() / n as f64;
        let variance = self
            .gaps
            .iter()
            .map(|g| (g - mean) * (g - mean))
            .sum::<f64>()
            / n as f64;

        variance.sqrt() * 1000.0
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }
}
