//! Call records

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voipmon_quality_core::QualityMetric;

/// Call type recorded for calls arriving through the gateway
pub const DEFAULT_CALL_TYPE: &str = "FXS_Gateway";

/// Call status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Active,
    #[default]
    Completed,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Active => write!(f, "active"),
            CallStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Signalling details captured when a call starts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInfo {
    pub from_address: String,
    pub to_address: String,
    pub transport: String,
    pub remote_addr: Option<String>,
    pub call_type: String,
}

impl SessionInfo {
    pub fn new(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        transport: impl Into<String>,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            transport: transport.into(),
            remote_addr: None,
            call_type: DEFAULT_CALL_TYPE.to_string(),
        }
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }
}

/// A monitored call, active or completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Call {
    pub call_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds
    pub duration: f64,
    pub from_address: String,
    pub to_address: String,
    pub transport: String,
    pub remote_addr: Option<String>,
    pub call_type: String,
    pub status: CallStatus,

    /// Most recent snapshots, oldest first
    pub quality_metrics: VecDeque<QualityMetric>,

    pub avg_mos: f64,
    pub min_mos: f64,
    pub max_mos: f64,
    pub packet_loss_rate: f64,
    pub avg_jitter: f64,
    pub avg_delay: f64,

    // Latest snapshot, for live display
    pub current_mos: f64,
    pub current_jitter: f64,
    pub current_packet_loss: f64,
    pub current_delay: f64,
    pub codec: Option<String>,
}

impl Default for Call {
    fn default() -> Self {
        Self {
            call_id: String::new(),
            start_time: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            end_time: None,
            duration: 0.0,
            from_address: String::new(),
            to_address: String::new(),
            transport: String::new(),
            remote_addr: None,
            call_type: DEFAULT_CALL_TYPE.to_string(),
            status: CallStatus::Completed,
            quality_metrics: VecDeque::new(),
            avg_mos: 0.0,
            min_mos: 5.0,
            max_mos: 1.0,
            packet_loss_rate: 0.0,
            avg_jitter: 0.0,
            avg_delay: 0.0,
            current_mos: 0.0,
            current_jitter: 0.0,
            current_packet_loss: 0.0,
            current_delay: 0.0,
            codec: None,
        }
    }
}

impl Call {
    /// New active call. `min_mos` starts at 5.0 and `max_mos` at 1.0 so the
    /// first real sample sets both bounds.
    pub fn new(call_id: impl Into<String>, info: SessionInfo, start_time: DateTime<Utc>) -> Self {
        Self {
            call_id: call_id.into(),
            start_time,
            from_address: info.from_address,
            to_address: info.to_address,
            transport: info.transport,
            remote_addr: info.remote_addr,
            call_type: if info.call_type.is_empty() {
                DEFAULT_CALL_TYPE.to_string()
            } else {
                info.call_type
            },
            status: CallStatus::Active,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CallStatus::Active
    }

    /// Append a snapshot, keeping at most `window` of them, and refresh the
    /// live fields
    pub(crate) fn push_metric(&mut self, metric: QualityMetric, window: usize) {
        self.current_mos = metric.mos_score;
        self.current_jitter = metric.jitter;
        self.current_packet_loss = metric.packet_loss_rate;
        self.current_delay = metric.delay;
        self.packet_loss_rate = metric.packet_loss_rate;
        self.codec = Some(metric.codec.clone());

        self.quality_metrics.push_back(metric);
        while self.quality_metrics.len() > window.max(1) {
            self.quality_metrics.pop_front();
        }
    }

    /// Close the call and derive its aggregates from the retained window.
    ///
    /// "No RTP" placeholders are skipped; a call without real samples keeps
    /// zero averages and the initial MOS bounds.
    pub(crate) fn complete(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.duration = ((end_time - self.start_time).num_milliseconds() as f64 / 1000.0).max(0.0);
        self.status = CallStatus::Completed;

        let samples: Vec<&QualityMetric> = self
            .quality_metrics
            .iter()
            .filter(|m| !m.is_silence())
            .collect();
        if samples.is_empty() {
            return;
        }

        let n = samples.len() as f64;
        self.avg_mos = samples.iter().map(|m| m.mos_score).sum::<f64>() / n;
        self.avg_jitter = samples.iter().map(|m| m.jitter).sum::<f64>() / n;
        self.avg_delay = samples.iter().map(|m| m.delay).sum::<f64>() / n;
        self.packet_loss_rate = samples.iter().map(|m| m.packet_loss_rate).sum::<f64>() / n;
        self.min_mos = samples.iter().map(|m| m.mos_score).fold(f64::INFINITY, f64::min);
        self.max_mos = samples.iter().map(|m| m.mos_score).fold(f64::NEG_INFINITY, f64::max);
    }
}
