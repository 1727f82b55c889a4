use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use voipmon_quality_core::QualityMetric;
use voipmon_rtp_core::{CallMetricsSink, ExitReason, RtpProcessor, RtpProcessorConfig};

struct RecordingSink {
    active: AtomicBool,
    metrics: Mutex<Vec<(String, QualityMetric)>>,
    liveness: Option<watch::Receiver<bool>>,
}

impl RecordingSink {
    fn new(liveness: Option<watch::Receiver<bool>>) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(true),
            metrics: Mutex::new(Vec::new()),
            liveness,
        })
    }

    fn metrics(&self) -> Vec<QualityMetric> {
        self.metrics.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl CallMetricsSink for RecordingSink {
    fn is_active(&self, _call_id: &str) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn update_metrics(&self, call_id: &str, metric: QualityMetric) {
        self.metrics.lock().unwrap().push((call_id.to_string(), metric));
    }

    fn watch_call(&self, _call_id: &str) -> Option<watch::Receiver<bool>> {
        self.liveness.clone()
    }
}

fn fast_config() -> RtpProcessorConfig {
    RtpProcessorConfig {
        receive_tick_ms: 50,
        silence_timeout_ms: 200,
        ..RtpProcessorConfig::default()
    }
}

fn rtp(pt: u8, seq: u16) -> Vec<u8> {
    let mut data = vec![0x80, pt];
    data.extend_from_slice(&seq.to_be_bytes());
    data.extend_from_slice(&(u32::from(seq) * 160).to_be_bytes());
    data.extend_from_slice(&0x1234u32.to_be_bytes());
    data.extend_from_slice(&[0x55; 160]);
    data
}

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn reports_snapshot_every_ten_packets() {
    let sink = RecordingSink::new(None);
    let processor = RtpProcessor::bind("call-1", loopback(), sink.clone(), RtpProcessorConfig::default())
        .await
        .unwrap();
    let handle = processor.handle();
    let target = processor.local_addr();
    let task = processor.spawn();

    let client = UdpSocket::bind(loopback()).await.unwrap();
    for seq in 1..=20u16 {
        client.send_to(&rtp(0, seq), target).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    // runt packet is dropped without counting
    client.send_to(&[0x80, 0x00], target).await.unwrap();

    wait_for(|| sink.metrics().len() >= 2).await;
    handle.stop();

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.reason, ExitReason::Stopped);
    assert_eq!(summary.call_id, "call-1");
    assert_eq!(summary.snapshots, 2);

    let metrics = sink.metrics();
    assert_eq!(metrics[0].packets_received, 10);
    assert_eq!(metrics[1].packets_received, 20);
    assert_eq!(metrics[1].packets_lost, 0);
    assert_eq!(metrics[1].codec, "G.711");
    assert!(metrics[1].mos_score >= 1.0 && metrics[1].mos_score <= 4.5);
    assert_eq!(metrics[1].delay, 50.0);
}

#[tokio::test]
async fn exits_when_call_is_no_longer_active() {
    let sink = RecordingSink::new(None);
    let processor = RtpProcessor::bind("call-2", loopback(), sink.clone(), fast_config())
        .await
        .unwrap();
    let task = processor.spawn();

    sink.active.store(false, Ordering::SeqCst);

    let summary = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.reason, ExitReason::CallEnded);
}

#[tokio::test]
async fn liveness_channel_ends_processing_promptly() {
    let (live_tx, live_rx) = watch::channel(true);
    let sink = RecordingSink::new(Some(live_rx));
    let config = RtpProcessorConfig {
        receive_tick_ms: 60_000,
        ..RtpProcessorConfig::default()
    };
    let processor = RtpProcessor::bind("call-3", loopback(), sink, config).await.unwrap();
    let task = processor.spawn();

    live_tx.send(false).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.reason, ExitReason::CallEnded);
}

#[tokio::test]
async fn silent_call_reports_no_rtp() {
    let sink = RecordingSink::new(None);
    let processor = RtpProcessor::bind("call-4", loopback(), sink.clone(), fast_config())
        .await
        .unwrap();
    let handle = processor.handle();
    let task = processor.spawn();

    wait_for(|| !sink.metrics().is_empty()).await;
    handle.stop();
    task.await.unwrap().unwrap();

    let metrics = sink.metrics();
    assert_eq!(metrics[0].codec, "No RTP");
    assert_eq!(metrics[0].mos_score, 0.0);
    assert_eq!(metrics[0].packets_received, 0);
}

#[tokio::test]
async fn port_is_released_after_stop() {
    let sink = RecordingSink::new(None);
    let processor = RtpProcessor::bind("call-5", loopback(), sink.clone(), fast_config())
        .await
        .unwrap();
    let addr = processor.local_addr();
    let handle = processor.handle();
    let task = processor.spawn();

    handle.stop();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.reason, ExitReason::Stopped);

    UdpSocket::bind(addr).await.unwrap();
}

#[tokio::test]
async fn binds_inside_requested_range() {
    let sink = RecordingSink::new(None);
    let processor = RtpProcessor::bind_in_range(
        "call-6",
        "127.0.0.1".parse().unwrap(),
        40000..=40999,
        sink,
        fast_config(),
    )
    .await
    .unwrap();

    let port = processor.handle().port();
    assert!((40000..=40999).contains(&port));
}
