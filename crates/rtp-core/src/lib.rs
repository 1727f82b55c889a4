//! # voipmon-rtp-core
//!
//! Passive RTP analysis for call-quality monitoring.
//!
//! One [`RtpProcessor`] owns the UDP socket of one call. It parses the RFC 3550
//! fixed header of every packet, keeps bounded windows of sequence numbers and
//! inter-arrival gaps, and every N packets scores the stream with the E-Model
//! calculator from `voipmon-quality-core`. Snapshots are submitted to a
//! [`CallMetricsSink`]; the processor never holds call state of its own.
//!
//! Loss and jitter are windowed estimates (last 100 sequence numbers, last 50
//! gaps), not exact session counters. One-way delay is a configured constant.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod packet;
pub mod processor;
pub mod stats;

pub use analyzer::StreamAnalyzer;
pub use config::RtpProcessorConfig;
pub use error::{Error, Result};
pub use packet::{RtpHeader, RTP_MIN_HEADER_SIZE, RTP_VERSION};
pub use processor::{CallMetricsSink, ExitReason, RtpProcessor, RtpProcessorHandle, StreamSummary};
pub use stats::{lost_in_window, ArrivalJitter, SequenceWindow};
