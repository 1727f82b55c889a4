//! Thread-safe call lifecycle manager

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use voipmon_quality_core::QualityMetric;
use voipmon_rtp_core::CallMetricsSink;

use crate::call::{Call, SessionInfo};
use crate::config::CallManagerConfig;
use crate::stats::SummaryStats;
use crate::store::{HistoryStore, MemoryStore};

struct ActiveCall {
    call: Call,
    /// Flipped to `false` when the call ends
    live_tx: watch::Sender<bool>,
}

#[derive(Default)]
struct CallState {
    active: HashMap<String, ActiveCall>,
    history: Vec<Call>,
}

/// Owner of every call record.
///
/// All mutation happens under one mutex. The "has updates" flag is
/// level-triggered and reset on read: any number of changes between two
/// polls collapse into a single `true`.
pub struct CallManager {
    state: Mutex<CallState>,
    dirty: AtomicBool,
    store: Box<dyn HistoryStore>,
    config: CallManagerConfig,
}

impl CallManager {
    /// Create a manager, loading history from `store`.
    ///
    /// A history that fails to load is logged and replaced by an empty one.
    pub fn new(config: CallManagerConfig, store: Box<dyn HistoryStore>) -> Self {
        let history = match store.load() {
            Ok(calls) => {
                info!("Loaded {} calls from history", calls.len());
                calls
            }
            Err(e) => {
                error!("Error loading call history, starting empty: {}", e);
                Vec::new()
            }
        };

        Self {
            state: Mutex::new(CallState {
                active: HashMap::new(),
                history,
            }),
            dirty: AtomicBool::new(false),
            store,
            config,
        }
    }

    /// Manager with default settings and no persistence
    pub fn in_memory() -> Self {
        Self::new(CallManagerConfig::default(), Box::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &CallManagerConfig {
        &self.config
    }

    /// Start tracking a call. Returns `false` if the call is already active.
    pub fn start_call(&self, call_id: &str, info: SessionInfo) -> bool {
        self.start_call_at(call_id, info, Utc::now())
    }

    /// [`start_call`](Self::start_call) with an explicit start time
    pub fn start_call_at(&self, call_id: &str, info: SessionInfo, start: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();
        if state.active.contains_key(call_id) {
            debug!(call_id = %call_id, "Call already active, ignoring start");
            return false;
        }

        let (live_tx, _) = watch::channel(true);
        let call = Call::new(call_id, info, start);
        info!(
            call_id = %call_id,
            from = %call.from_address,
            to = %call.to_address,
            transport = %call.transport,
            "Call started"
        );
        state
            .active
            .insert(call_id.to_string(), ActiveCall { call, live_tx });
        self.mark_dirty();
        true
    }

    /// Record a quality snapshot. Unknown or ended calls are ignored.
    pub fn update_metrics(&self, call_id: &str, metric: QualityMetric) -> bool {
        let mut state = self.state.lock();
        let Some(active) = state.active.get_mut(call_id) else {
            debug!(call_id = %call_id, "Metrics for inactive call dropped");
            return false;
        };

        debug!(
            call_id = %call_id,
            mos = metric.mos_score,
            loss = metric.packet_loss_rate,
            jitter = metric.jitter,
            "Call metrics updated"
        );
        active.call.push_metric(metric, self.config.metric_window);
        self.mark_dirty();
        true
    }

    /// End a call, move it to history and persist. Returns the final record.
    pub fn end_call(&self, call_id: &str) -> Option<Call> {
        self.end_call_at(call_id, Utc::now())
    }

    /// [`end_call`](Self::end_call) with an explicit end time
    pub fn end_call_at(&self, call_id: &str, end: DateTime<Utc>) -> Option<Call> {
        let mut state = self.state.lock();
        let call = self.finish_locked(&mut state, call_id, end)?;
        self.persist_locked(&state);
        Some(call)
    }

    fn finish_locked(&self, state: &mut CallState, call_id: &str, end: DateTime<Utc>) -> Option<Call> {
        let Some(ActiveCall { mut call, live_tx }) = state.active.remove(call_id) else {
            debug!(call_id = %call_id, "End requested for unknown call");
            return None;
        };

        call.complete(end);
        let _ = live_tx.send(false);

        info!(
            call_id = %call_id,
            duration = call.duration,
            avg_mos = call.avg_mos,
            "Call ended"
        );

        state.history.push(call.clone());
        self.mark_dirty();
        Some(call)
    }

    fn persist_locked(&self, state: &CallState) {
        if let Err(e) = self.store.save(&state.history) {
            error!("Error saving call history: {}", e);
        }
    }

    pub fn get_active_calls(&self) -> Vec<Call> {
        let state = self.state.lock();
        let mut calls: Vec<Call> = state.active.values().map(|a| a.call.clone()).collect();
        calls.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        calls
    }

    pub fn get_active_call(&self, call_id: &str) -> Option<Call> {
        self.state.lock().active.get(call_id).map(|a| a.call.clone())
    }

    /// Completed calls, most recent start first
    pub fn get_history(&self, limit: usize) -> Vec<Call> {
        let state = self.state.lock();
        let mut calls = state.history.clone();
        calls.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        calls.truncate(limit);
        calls
    }

    pub fn is_active(&self, call_id: &str) -> bool {
        self.state.lock().active.contains_key(call_id)
    }

    /// Liveness channel for a running call
    pub fn watch_call(&self, call_id: &str) -> Option<watch::Receiver<bool>> {
        self.state
            .lock()
            .active
            .get(call_id)
            .map(|a| a.live_tx.subscribe())
    }

    /// Whether anything changed since the last call; clears the flag
    pub fn has_updates(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn get_summary_stats(&self) -> SummaryStats {
        self.summary_stats_at(Utc::now())
    }

    pub fn summary_stats_at(&self, now: DateTime<Utc>) -> SummaryStats {
        let state = self.state.lock();
        let active: Vec<&Call> = state.active.values().map(|a| &a.call).collect();
        SummaryStats::compute(&state.history, &active, now)
    }

    /// Drop all completed calls and persist the empty history
    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.history.clear();
        self.persist_locked(&state);
        self.mark_dirty();
        info!("Call history cleared");
    }

    /// Force-end orphaned calls as of `now`: older than the no-metrics
    /// threshold without any snapshot, or older than the hard limit.
    /// Returns the ended call IDs.
    pub fn sweep_orphans_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let no_metrics = Duration::seconds(self.config.orphan_without_metrics_secs as i64);
        let max_age = Duration::seconds(self.config.orphan_max_age_secs as i64);

        let mut state = self.state.lock();
        let orphans: Vec<String> = state
            .active
            .iter()
            .filter(|(_, a)| {
                let age = now - a.call.start_time;
                (age > no_metrics && a.call.quality_metrics.is_empty()) || age > max_age
            })
            .map(|(id, _)| id.clone())
            .collect();

        if orphans.is_empty() {
            return orphans;
        }

        for call_id in &orphans {
            warn!(call_id = %call_id, "Cleaning up orphaned call");
            self.finish_locked(&mut state, call_id, now);
        }
        self.persist_locked(&state);
        orphans
    }

    pub fn sweep_orphans(&self) -> Vec<String> {
        self.sweep_orphans_at(Utc::now())
    }

    /// Run the orphan sweep periodically until `shutdown` flips to `true`
    pub fn spawn_orphan_sweeper(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let period = self.config.sweep_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let ended = manager.sweep_orphans();
                        if !ended.is_empty() {
                            info!("Orphan sweep ended {} calls", ended.len());
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("Orphan sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl CallMetricsSink for CallManager {
    fn is_active(&self, call_id: &str) -> bool {
        CallManager::is_active(self, call_id)
    }

    fn update_metrics(&self, call_id: &str, metric: QualityMetric) {
        CallManager::update_metrics(self, call_id, metric);
    }

    fn watch_call(&self, call_id: &str) -> Option<watch::Receiver<bool>> {
        CallManager::watch_call(self, call_id)
    }
}
