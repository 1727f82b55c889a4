//! E-Model MOS estimation
//!
//! Simplified no-reference variant of ITU-T G.107. Delay is an input, not a
//! measurement; without RTCP the caller supplies an estimate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::Error;

/// Lowest score the calculator ever returns
pub const MIN_MOS: f64 = 1.0;
/// Highest score the calculator ever returns
pub const MAX_MOS: f64 = 4.5;

/// Basic signal-to-noise ratio
const R0: f64 = 93.2;
/// Simultaneous impairment factor
const IS: f64 = 1.41;
/// Advantage factor
const A: f64 = 0.0;
/// Packet-loss burstiness (random loss)
const BPL: f64 = 1.0;

/// Quality buckets, shared with the call statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityCategory {
    Excellent,
    Good,
    Fair,
    Poor,
    Bad,
}

impl QualityCategory {
    /// Bucket a MOS score: Excellent >= 4.0, Good >= 3.5, Fair >= 3.0,
    /// Poor >= 2.0, anything lower is Bad.
    pub fn from_mos(mos: f64) -> Self {
        if mos >= 4.0 {
            Self::Excellent
        } else if mos >= 3.5 {
            Self::Good
        } else if mos >= 3.0 {
            Self::Fair
        } else if mos >= 2.0 {
            Self::Poor
        } else {
            Self::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Bad => "Bad",
        }
    }
}

impl fmt::Display for QualityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            "bad" => Ok(Self::Bad),
            _ => Err(Error::UnknownCategory(s.to_string())),
        }
    }
}

/// Breakdown of the impairments that went into an R-factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpairmentFactors {
    /// Delay impairment `Id`
    pub delay_impairment: f64,
    /// Effective equipment impairment `Ie_eff` (codec, loss and jitter)
    pub equipment_impairment: f64,
    /// Simultaneous impairment `Is`
    pub simultaneous_impairment: f64,
}

/// Result of [`MosCalculator::detailed`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub mos_score: f64,
    pub quality_category: QualityCategory,
    pub recommendations: Vec<String>,
    /// R-factor clamped to [0, 100]
    pub r_factor: f64,
    pub impairment_factors: ImpairmentFactors,
    pub packet_loss_rate: f64,
    pub jitter: f64,
    pub delay: f64,
    pub codec: String,
}

/// Stateless MOS calculator
#[derive(Debug, Default, Clone, Copy)]
pub struct MosCalculator;

impl MosCalculator {
    /// Compute a MOS score in `[1.0, 4.5]`, rounded to two decimals.
    ///
    /// Never fails: loss is clamped to 0..=100 percent, negative or NaN
    /// inputs count as zero, and an unknown codec is scored like G.711.
    pub fn calculate_mos(packet_loss_rate: f64, jitter: f64, delay: f64, codec: &str) -> f64 {
        let codec = Codec::from_name(codec);
        let (loss, jitter, delay) = sanitize(packet_loss_rate, jitter, delay);
        let r = r_factor(loss, jitter, delay, codec);
        round2(r_to_mos(r)).clamp(MIN_MOS, MAX_MOS)
    }

    /// MOS plus category, recommendations and the R-factor breakdown
    pub fn detailed(packet_loss_rate: f64, jitter: f64, delay: f64, codec: &str) -> QualityReport {
        let parsed = Codec::from_name(codec);
        let (loss, jit, del) = sanitize(packet_loss_rate, jitter, delay);

        let id = delay_impairment(del);
        let ie_eff = equipment_impairment(loss, jit, parsed);
        let r = r_factor(loss, jit, del, parsed);
        let mos_score = Self::calculate_mos(packet_loss_rate, jitter, delay, codec);

        QualityReport {
            mos_score,
            quality_category: QualityCategory::from_mos(mos_score),
            recommendations: recommendations(loss, jit, del),
            r_factor: r,
            impairment_factors: ImpairmentFactors {
                delay_impairment: id,
                equipment_impairment: ie_eff,
                simultaneous_impairment: IS,
            },
            packet_loss_rate: loss,
            jitter: jit,
            delay: del,
            codec: codec.to_string(),
        }
    }
}

/// Advice derived from the raw impairments
pub fn recommendations(packet_loss_rate: f64, jitter: f64, delay: f64) -> Vec<String> {
    let mut out = Vec::new();

    if packet_loss_rate > 5.0 {
        out.push("High packet loss detected. Check network congestion and QoS settings.".to_string());
    }
    if jitter > 50.0 {
        out.push(
            "High jitter detected. Consider implementing jitter buffer or QoS prioritization."
                .to_string(),
        );
    }
    if delay > 150.0 {
        out.push(
            "High delay detected. Check network routing and consider geographic proximity."
                .to_string(),
        );
    }
    if out.is_empty() {
        out.push("Call quality metrics are within acceptable ranges.".to_string());
    }

    out
}

fn sanitize(loss: f64, jitter: f64, delay: f64) -> (f64, f64, f64) {
    let non_negative = |v: f64| if v.is_nan() { 0.0 } else { v.max(0.0) };
    (
        non_negative(loss).min(100.0),
        non_negative(jitter),
        non_negative(delay),
    )
}

fn delay_impairment(delay: f64) -> f64 {
    if delay <= 100.0 {
        0.0
    } else if delay <= 200.0 {
        0.024 * delay - 2.4
    } else {
        0.11 * (delay - 177.3) + 2.4
    }
}

fn equipment_impairment(loss: f64, jitter: f64, codec: Codec) -> f64 {
    let mut ie = codec.equipment_impairment();

    if loss > 0.0 {
        ie += (95.0 - ie) * (loss / (loss + BPL));
    }
    if jitter > 20.0 {
        ie += ((jitter - 20.0) * 0.5).min(20.0);
    }

    ie
}

fn r_factor(loss: f64, jitter: f64, delay: f64, codec: Codec) -> f64 {
    let r = R0 - IS - delay_impairment(delay) - equipment_impairment(loss, jitter, codec) + A;
    if r.is_nan() {
        0.0
    } else {
        r.clamp(0.0, 100.0)
    }
}

fn r_to_mos(r: f64) -> f64 {
    if r < 6.5 {
        MIN_MOS
    } else if r < 93.2 {
        1.0 + 0.035 * r + 7e-6 * r * (r - 60.0) * (100.0 - r)
    } else {
        MAX_MOS
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
