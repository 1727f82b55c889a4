//! Windowed packet-loss estimate
//!
//! Loss is `(max - min + 1) - distinct` over the most recent sequence numbers.
//! This is an estimate over a sliding window, not an RFC 3550 cumulative
//! counter: a 16-bit wraparound inside the window inflates the span and the
//! result over-reports loss until the window rolls past the wrap.

use std::collections::{HashSet, VecDeque};

/// Loss count for a set of observed sequence numbers.
///
/// Returns 0 for fewer than two observations. Duplicates count once.
pub fn lost_in_window<I>(sequences: I) -> u64
where
    I: IntoIterator<Item = u16>,
{
    let mut distinct = HashSet::new();
    let mut min = u16::MAX;
    let mut max = u16::MIN;
    let mut seen = 0usize;

    for seq in sequences {
        distinct.insert(seq);
        min = min.min(seq);
        max = max.max(seq);
        seen += 1;
    }

    if seen < 2 {
        return 0;
    }

    let expected = u64::from(max - min) + 1;
    expected.saturating_sub(distinct.len() as u64)
}

/// The last `capacity` sequence numbers, in arrival order
#[derive(Debug, Clone)]
pub struct SequenceWindow {
    capacity: usize,
    sequences: VecDeque<u16>,
}

impl SequenceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            sequences: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a sequence number, evicting the oldest when full
    pub fn push(&mut self, seq: u16) {
        if self.sequences.len() == self.capacity {
            self.sequences.pop_front();
        }
        self.sequences.push_back(seq);
    }

    /// Current loss estimate over the window
    pub fn lost(&self) -> u64 {
        lost_in_window(self.sequences.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
