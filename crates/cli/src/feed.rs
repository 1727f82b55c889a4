//! Observer feed: periodic call updates and an event logger

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use voipmon_call_engine::CallManager;
use voipmon_infra_common::{EventKind, EventSink, MonitorEvent};

/// Publish the active calls whenever the call manager reports a change.
///
/// Emits one `call_update` with every active call, then one `quality_update`
/// per call that already has samples. Returns whether anything was published.
pub fn publish_updates(calls: &CallManager, events: &dyn EventSink) -> bool {
    if !calls.has_updates() {
        return false;
    }

    let active = calls.get_active_calls();
    events.publish(MonitorEvent::from_serializable(EventKind::CallUpdate, &active));

    for call in active.iter().filter(|c| !c.quality_metrics.is_empty()) {
        events.publish(MonitorEvent::new(
            EventKind::QualityUpdate,
            json!({
                "call_id": call.call_id,
                "metrics": call.quality_metrics,
            }),
        ));
    }
    true
}

/// Poll [`publish_updates`] every `period` until shutdown
pub async fn run_update_broadcaster(
    calls: Arc<CallManager>,
    events: Arc<dyn EventSink>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                publish_updates(&calls, events.as_ref());
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Update broadcaster stopped");
}

/// Log every observer event as JSON at debug level
pub async fn log_events(mut rx: broadcast::Receiver<MonitorEvent>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => match serde_json::to_string(&event.payload) {
                    Ok(payload) => debug!(event = %event.event, "{}", payload),
                    Err(e) => warn!(event = %event.event, "Unprintable event payload: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}
