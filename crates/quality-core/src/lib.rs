//! # voipmon-quality-core
//!
//! No-reference voice quality estimation.
//!
//! This crate turns network impairments (packet loss, jitter, one-way delay)
//! and the codec in use into a Mean Opinion Score using a simplified ITU-T
//! G.107 E-Model. Everything here is pure: no I/O, no shared state.
//!
//! ```
//! use voipmon_quality_core::{MosCalculator, QualityCategory};
//!
//! let mos = MosCalculator::calculate_mos(0.0, 0.0, 50.0, "G.711");
//! assert_eq!(QualityCategory::from_mos(mos), QualityCategory::Excellent);
//! ```

pub mod codec;
pub mod error;
pub mod metric;
pub mod mos;

pub use codec::Codec;
pub use error::{Error, Result};
pub use metric::{QualityMetric, NO_RTP_CODEC};
pub use mos::{
    recommendations, ImpairmentFactors, MosCalculator, QualityCategory, QualityReport,
    MAX_MOS, MIN_MOS,
};
