//! Per-call RTP receive loop

use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use voipmon_quality_core::QualityMetric;

use crate::analyzer::StreamAnalyzer;
use crate::config::RtpProcessorConfig;
use crate::error::{Error, Result};
use crate::packet::RTP_MIN_HEADER_SIZE;

/// Random bind attempts before giving up on a port range
const PORT_ATTEMPTS: usize = 32;

/// Where a processor submits its snapshots.
///
/// The processor only ever submits; the owner of the call record decides what
/// to do with late or unknown updates.
pub trait CallMetricsSink: Send + Sync {
    /// Whether the call is still active; polled on every receive tick
    fn is_active(&self, call_id: &str) -> bool;

    /// Submit a snapshot. Must not block.
    fn update_metrics(&self, call_id: &str, metric: QualityMetric);

    /// Liveness channel that flips to `false` (or closes) when the call ends
    fn watch_call(&self, _call_id: &str) -> Option<watch::Receiver<bool>> {
        None
    }
}

/// Why a processor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// [`RtpProcessorHandle::stop`] was called
    Stopped,
    /// The call is no longer active
    CallEnded,
}

/// Final counters of a finished processor
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub call_id: String,
    pub local_addr: SocketAddr,
    pub reason: ExitReason,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub malformed: u64,
    pub snapshots: u64,
}

/// Control handle of a running processor
#[derive(Debug, Clone)]
pub struct RtpProcessorHandle {
    call_id: String,
    local_addr: SocketAddr,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl RtpProcessorHandle {
    /// Ask the processor to exit; its socket is closed on the way out
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }
}

/// One call's RTP receiver
pub struct RtpProcessor {
    call_id: String,
    socket: UdpSocket,
    local_addr: SocketAddr,
    sink: Arc<dyn CallMetricsSink>,
    config: RtpProcessorConfig,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl RtpProcessor {
    /// Bind the media socket for a call
    pub async fn bind(
        call_id: impl Into<String>,
        addr: SocketAddr,
        sink: Arc<dyn CallMetricsSink>,
        config: RtpProcessorConfig,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Self::from_socket(call_id.into(), socket, sink, config)
    }

    /// Bind a random free port of `range` on `ip`
    pub async fn bind_in_range(
        call_id: impl Into<String>,
        ip: IpAddr,
        range: RangeInclusive<u16>,
        sink: Arc<dyn CallMetricsSink>,
        config: RtpProcessorConfig,
    ) -> Result<Self> {
        let call_id = call_id.into();
        let (start, end) = (*range.start(), *range.end());
        if start > end {
            return Err(Error::NoPortAvailable { start, end });
        }

        for _ in 0..PORT_ATTEMPTS {
            let port = rand::thread_rng().gen_range(start..=end);
            match UdpSocket::bind(SocketAddr::new(ip, port)).await {
                Ok(socket) => return Self::from_socket(call_id, socket, sink, config),
                Err(e) => debug!(call_id = %call_id, port, "RTP port unavailable: {}", e),
            }
        }

        Err(Error::NoPortAvailable { start, end })
    }

    fn from_socket(
        call_id: String,
        socket: UdpSocket,
        sink: Arc<dyn CallMetricsSink>,
        config: RtpProcessorConfig,
    ) -> Result<Self> {
        let local_addr = socket.local_addr()?;
        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            call_id,
            socket,
            local_addr,
            sink,
            config,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> RtpProcessorHandle {
        RtpProcessorHandle {
            call_id: self.call_id.clone(),
            local_addr: self.local_addr,
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// Bind `0.0.0.0:port` and process until the call ends
    pub async fn start(
        call_id: impl Into<String>,
        port: u16,
        sink: Arc<dyn CallMetricsSink>,
        config: RtpProcessorConfig,
    ) -> Result<StreamSummary> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        Self::bind(call_id, addr, sink, config).await?.run().await
    }

    /// Run on a new task
    pub fn spawn(self) -> JoinHandle<Result<StreamSummary>> {
        tokio::spawn(self.run())
    }

    /// Receive and analyze until the call ends, [`RtpProcessorHandle::stop`]
    /// is called, or the socket fails. The socket is dropped on every path.
    pub async fn run(self) -> Result<StreamSummary> {
        let RtpProcessor {
            call_id,
            socket,
            local_addr,
            sink,
            config,
            stop_tx: _stop_tx,
            mut stop_rx,
        } = self;

        let mut analyzer = StreamAnalyzer::new(&config);
        let mut liveness = sink.watch_call(&call_id);
        let mut buf = vec![0u8; config.recv_buffer_size.max(RTP_MIN_HEADER_SIZE)];
        let tick = config.receive_tick();
        let silence_timeout = config.silence_timeout();
        let mut last_activity = Instant::now();
        let mut snapshots = 0u64;

        info!(call_id = %call_id, addr = %local_addr, "RTP processor listening");

        let outcome = loop {
            if *stop_rx.borrow() {
                break Ok(ExitReason::Stopped);
            }
            if let Some(rx) = liveness.as_ref() {
                if !*rx.borrow() {
                    break Ok(ExitReason::CallEnded);
                }
            }

            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break Ok(ExitReason::Stopped);
                    }
                }
                alive = call_liveness(liveness.as_mut()) => {
                    if !alive {
                        break Ok(ExitReason::CallEnded);
                    }
                }
                received = timeout(tick, socket.recv_from(&mut buf)) => match received {
                    Ok(Ok((len, peer))) => {
                        last_activity = Instant::now();
                        match analyzer.on_datagram(&buf[..len], last_activity) {
                            Ok((header, snapshot)) => {
                                let count = analyzer.packets_received();
                                if count <= config.verbose_packets {
                                    debug!(
                                        call_id = %call_id,
                                        peer = %peer,
                                        seq = header.sequence_number,
                                        pt = header.payload_type,
                                        bytes = len,
                                        "RTP packet #{} received",
                                        count
                                    );
                                } else if count == config.verbose_packets + 1 {
                                    debug!(call_id = %call_id, "RTP processing active, further packets logged at trace");
                                }

                                if let Some(metric) = snapshot {
                                    debug!(
                                        call_id = %call_id,
                                        mos = metric.mos_score,
                                        loss = metric.packet_loss_rate,
                                        jitter = metric.jitter,
                                        codec = %metric.codec,
                                        "Quality snapshot"
                                    );
                                    sink.update_metrics(&call_id, metric);
                                    snapshots += 1;
                                }
                            }
                            Err(e) => debug!(call_id = %call_id, peer = %peer, "Dropping datagram: {}", e),
                        }
                    }
                    Ok(Err(e)) => {
                        error!(call_id = %call_id, addr = %local_addr, "RTP socket error: {}", e);
                        break Err(Error::from(e));
                    }
                    Err(_) => {
                        if !sink.is_active(&call_id) {
                            break Ok(ExitReason::CallEnded);
                        }
                        if last_activity.elapsed() >= silence_timeout {
                            debug!(call_id = %call_id, "No RTP for {:?}, reporting silence", silence_timeout);
                            sink.update_metrics(&call_id, analyzer.silence_snapshot());
                            snapshots += 1;
                            last_activity = Instant::now();
                        }
                    }
                },
            }
        };

        drop(socket);

        match outcome {
            Ok(reason) => {
                info!(
                    call_id = %call_id,
                    reason = ?reason,
                    packets = analyzer.packets_received(),
                    lost = analyzer.packets_lost(),
                    "RTP processor finished"
                );
                Ok(StreamSummary {
                    call_id,
                    local_addr,
                    reason,
                    packets_received: analyzer.packets_received(),
                    packets_lost: analyzer.packets_lost(),
                    malformed: analyzer.malformed(),
                    snapshots,
                })
            }
            Err(e) => {
                warn!(call_id = %call_id, "RTP processor aborted: {}", e);
                Err(e)
            }
        }
    }
}

/// Resolves with the new liveness value; never resolves without a channel
async fn call_liveness(rx: Option<&mut watch::Receiver<bool>>) -> bool {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => *rx.borrow(),
            Err(_) => false,
        },
        None => std::future::pending().await,
    }
}
