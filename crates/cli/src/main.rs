//! `voipmon`: SIP registrar with live call-quality monitoring

mod config;
mod feed;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use voipmon_call_engine::{CallManager, JsonFileStore};
use voipmon_infra_common::logging::log_welcome;
use voipmon_infra_common::{setup_logging, BroadcastEventSink, EventSink};
use voipmon_registrar_core::SipRegistrar;

use crate::config::{Args, MonitorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = MonitorConfig::load(args.config.as_deref())?;
    config.apply_args(&args);

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    setup_logging(&config.logging).context("failed to initialise logging")?;
    log_welcome(&config.logging.app_name, env!("CARGO_PKG_VERSION"));

    let store = JsonFileStore::new(config.calls.history_path.clone());
    let calls = Arc::new(CallManager::new(config.calls.clone(), Box::new(store)));
    info!(
        history = %config.calls.history_path.display(),
        calls = calls.get_history(usize::MAX).len(),
        "Call history loaded"
    );

    let broadcast = Arc::new(BroadcastEventSink::new(config.feed.capacity));
    let events: Arc<dyn EventSink> = broadcast.clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    if config.feed.log_events {
        tasks.push(tokio::spawn(feed::log_events(broadcast.subscribe(), shutdown_rx.clone())));
    }
    tasks.push(calls.spawn_orphan_sweeper(shutdown_rx.clone()));
    tasks.push(tokio::spawn(feed::run_update_broadcaster(
        calls.clone(),
        events.clone(),
        config.feed.update_interval(),
        shutdown_rx,
    )));

    let registrar = SipRegistrar::new(config.sip.clone(), config.rtp.clone(), calls.clone(), events);
    let handle = registrar.start().await.context("failed to start SIP registrar")?;

    info!(
        udp = %handle.udp_addr(),
        tcp = %handle.tcp_addr(),
        tls = ?handle.tls_addr(),
        domain = %config.sip.domain,
        advertised_ip = %registrar.advertised_ip(),
        "VoIP quality monitor running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");

    handle.shutdown().await;
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    let stats = calls.get_summary_stats();
    info!(
        total_calls = stats.total_calls,
        active_calls = stats.active_calls,
        "voipmon stopped"
    );
    Ok(())
}
