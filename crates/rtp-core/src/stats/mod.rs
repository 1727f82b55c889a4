//! Bounded-memory stream statistics
//!
//! Both estimators keep a fixed-size window of recent observations, so memory
//! per call is constant no matter how long the call runs.

pub mod jitter;
pub mod loss;

pub use jitter::ArrivalJitter;
pub use loss::{lost_in_window, SequenceWindow};
