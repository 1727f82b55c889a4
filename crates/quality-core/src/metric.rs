use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mos::QualityCategory;

/// Codec label carried by the placeholder sample emitted while a call has no media
pub const NO_RTP_CODEC: &str = "No RTP";

/// One quality snapshot for a call. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetric {
    pub timestamp: DateTime<Utc>,
    pub mos_score: f64,
    /// Percent, 0..=100
    pub packet_loss_rate: f64,
    /// Milliseconds
    pub jitter: f64,
    /// Milliseconds (estimated, not measured)
    pub delay: f64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub codec: String,
}

impl QualityMetric {
    /// Placeholder sample for a call whose media has gone quiet
    pub fn silence(delay: f64, packets_received: u64, packets_lost: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            mos_score: 0.0,
            packet_loss_rate: 0.0,
            jitter: 0.0,
            delay,
            packets_received,
            packets_lost,
            codec: NO_RTP_CODEC.to_string(),
        }
    }

    /// True for placeholders produced by [`QualityMetric::silence`]
    pub fn is_silence(&self) -> bool {
        self.codec == NO_RTP_CODEC || self.mos_score <= 0.0
    }

    pub fn category(&self) -> Option<QualityCategory> {
        if self.is_silence() {
            None
        } else {
            Some(QualityCategory::from_mos(self.mos_score))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_marker() {
        let m = QualityMetric::silence(50.0, 12, 3);
        assert!(m.is_silence());
        assert_eq!(m.category(), None);
        assert_eq!(m.codec, "No RTP");
        assert_eq!(m.packets_received, 12);
        assert_eq!(m.packets_lost, 3);

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["codec"], "No RTP");
        assert_eq!(json["mos_score"], 0.0);
    }
}
