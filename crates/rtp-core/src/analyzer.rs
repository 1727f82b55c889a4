//! Turns a sequence of raw datagrams into quality snapshots

use std::time::Instant;

use chrono::Utc;
use tracing::trace;
use voipmon_quality_core::{Codec, MosCalculator, QualityMetric};

use crate::config::RtpProcessorConfig;
use crate::error::Result;
use crate::packet::RtpHeader;
use crate::stats::{ArrivalJitter, SequenceWindow};

/// Per-stream statistics. Owned by exactly one processor, so no locking.
#[derive(Debug, Clone)]
pub struct StreamAnalyzer {
    sequences: SequenceWindow,
    jitter: ArrivalJitter,
    packets_received: u64,
    packets_lost: u64,
    malformed: u64,
    codec: Codec,
    report_every: u64,
    assumed_delay_ms: f64,
}

impl StreamAnalyzer {
    pub fn new(config: &RtpProcessorConfig) -> Self {
        Self {
            sequences: SequenceWindow::new(config.loss_window),
            jitter: ArrivalJitter::new(config.jitter_window),
            packets_received: 0,
            packets_lost: 0,
            malformed: 0,
            codec: Codec::G711,
            report_every: config.report_every.max(1),
            assumed_delay_ms: config.assumed_delay_ms,
        }
    }

    /// Account one datagram received at `arrival`.
    ///
    /// Returns the parsed header, plus a snapshot when this packet completes a
    /// reporting period. Malformed datagrams are counted and rejected without
    /// touching the statistics.
    pub fn on_datagram(
        &mut self,
        data: &[u8],
        arrival: Instant,
    ) -> Result<(RtpHeader, Option<QualityMetric>)> {
        let header = match RtpHeader::from_slice(data) {
            Ok(header) => header,
            Err(e) => {
                self.malformed += 1;
                return Err(e);
            }
        };

        self.packets_received += 1;
        self.codec = header.codec();
        self.sequences.push(header.sequence_number);
        self.packets_lost = self.sequences.lost();
        self.jitter.on_arrival(arrival);

        let snapshot = if self.packets_received % self.report_every == 0 {
            Some(self.snapshot())
        } else {
            None
        };

        trace!(
            seq = header.sequence_number,
            pt = header.payload_type,
            lost = self.packets_lost,
            "RTP packet accounted"
        );

        Ok((header, snapshot))
    }

    /// Loss as a percentage of received plus estimated lost packets
    pub fn packet_loss_rate(&self) -> f64 {
        let total = self.packets_received + self.packets_lost;
        if self.packets_received == 0 || total == 0 {
            return 0.0;
        }
        self.packets_lost as f64 / total as f64 * 100.0
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter.jitter_ms()
    }

    /// Score the stream as it stands now
    pub fn snapshot(&self) -> QualityMetric {
        let packet_loss_rate = self.packet_loss_rate();
        let jitter = self.jitter_ms();
        let delay = self.assumed_delay_ms;

        QualityMetric {
            timestamp: Utc::now(),
            mos_score: MosCalculator::calculate_mos(
                packet_loss_rate,
                jitter,
                delay,
                self.codec.as_str(),
            ),
            packet_loss_rate,
            jitter,
            delay,
            packets_received: self.packets_received,
            packets_lost: self.packets_lost,
            codec: self.codec.as_str().to_string(),
        }
    }

    /// Placeholder snapshot for a media-silent call
    pub fn silence_snapshot(&self) -> QualityMetric {
        QualityMetric::silence(self.assumed_delay_ms, self.packets_received, self.packets_lost)
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn packets_lost(&self) -> u64 {
        self.packets_lost
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rtp(pt: u8, seq: u16) -> Vec<u8> {
        let mut data = vec![0x80, pt];
        data.extend_from_slice(&seq.to_be_bytes());
        data.extend_from_slice(&(u32::from(seq) * 160).to_be_bytes());
        data.extend_from_slice(&7u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 160]);
        data
    }

    #[test]
    fn reports_every_tenth_packet() {
        let mut analyzer = StreamAnalyzer::new(&RtpProcessorConfig::default());
        let start = Instant::now();
        let mut reports = 0;

        for seq in 1..=25u16 {
            let at = start + Duration::from_millis(20 * u64::from(seq));
            let (_, snapshot) = analyzer.on_datagram(&rtp(0, seq), at).unwrap();
            if let Some(metric) = snapshot {
                reports += 1;
                assert_eq!(metric.packets_received % 10, 0);
                assert_eq!(metric.packet_loss_rate, 0.0);
                assert_eq!(metric.codec, "G.711");
                assert!(metric.mos_score >= 4.0);
            }
        }

        assert_eq!(reports, 2);
    }

    #[test]
    fn loss_rate_uses_window_estimate() {
        let mut analyzer = StreamAnalyzer::new(&RtpProcessorConfig::default());
        let now = Instant::now();
        for seq in [1u16, 2, 5] {
            analyzer.on_datagram(&rtp(18, seq), now).unwrap();
        }
        assert_eq!(analyzer.packets_lost(), 2);
        // 2 lost of 3 + 2
        assert!((analyzer.packet_loss_rate() - 40.0).abs() < 1e-9);
        assert_eq!(analyzer.codec(), Codec::G729);
        assert_eq!(analyzer.snapshot().codec, "G.729");
    }

    #[test]
    fn malformed_datagrams_are_counted_not_accounted() {
        let mut analyzer = StreamAnalyzer::new(&RtpProcessorConfig::default());
        assert!(analyzer.on_datagram(&[0x80, 0, 1], Instant::now()).is_err());
        assert!(analyzer.on_datagram(&[0u8; 20], Instant::now()).is_err());
        assert_eq!(analyzer.malformed(), 2);
        assert_eq!(analyzer.packets_received(), 0);
        assert_eq!(analyzer.packet_loss_rate(), 0.0);
    }

    #[test]
    fn silence_snapshot_marks_no_media() {
        let analyzer = StreamAnalyzer::new(&RtpProcessorConfig::default());
        let metric = analyzer.silence_snapshot();
        assert_eq!(metric.codec, "No RTP");
        assert_eq!(metric.mos_score, 0.0);
        assert_eq!(metric.delay, 50.0);
    }
}
