use std::time::Duration;

use serde::{Deserialize, Serialize};

/// RTP processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtpProcessorConfig {
    /// Receive timeout, doubling as the call-liveness check interval (ms)
    pub receive_tick_ms: u64,

    /// Quiet period after which a "No RTP" snapshot is emitted (ms)
    pub silence_timeout_ms: u64,

    /// Emit a quality snapshot every N received packets
    pub report_every: u64,

    /// Number of sequence numbers kept for the loss estimate
    pub loss_window: usize,

    /// Number of inter-arrival gaps kept for the jitter estimate
    pub jitter_window: usize,

    /// Assumed one-way delay fed to the E-Model (ms); there is no RTCP
    pub assumed_delay_ms: f64,

    /// Datagram receive buffer size
    pub recv_buffer_size: usize,

    /// Packets logged individually at debug level before dropping to trace
    pub verbose_packets: u64,
}

impl Default for RtpProcessorConfig {
    fn default() -> Self {
        Self {
            receive_tick_ms: 1000,
            silence_timeout_ms: 5000,
            report_every: 10,
            loss_window: 100,
            jitter_window: 50,
            assumed_delay_ms: 50.0,
            recv_buffer_size: 2048,
            verbose_packets: 5,
        }
    }
}

impl RtpProcessorConfig {
    pub fn receive_tick(&self) -> Duration {
        Duration::from_millis(self.receive_tick_ms.max(1))
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }
}
