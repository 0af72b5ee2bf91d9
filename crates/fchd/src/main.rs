//! fchd: NDN find-closest-hub daemon.
//!
//! Keeps the router directory fresh, probes every router on a fixed
//! interval, and answers "which routers are closest to me" over HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use fch_api::ApiState;
use fch_core::config::{FchConfig, RoutersConfig};
use fch_core::TransportType;
use fch_services::{
    AvailabilityRefresher, AvailabilityStore, DirectoryRefresher, JsonFileSource, ProbeDispatcher,
    RefreshSettings, RouterDirectory, RouterSource, StaticSource, TestbedSource,
};

/// Lower bound for the directory refresh interval.
const MIN_DIRECTORY_REFRESH: Duration = Duration::from_secs(60);

fn build_sources(config: &RoutersConfig) -> Result<Vec<Arc<dyn RouterSource>>> {
    let mut sources: Vec<Arc<dyn RouterSource>> = Vec::new();

    if !config.testbed_uri.is_empty() {
        let cache = Some(config.testbed_cache.clone()).filter(|p| !p.as_os_str().is_empty());
        sources.push(Arc::new(TestbedSource::new(&config.testbed_uri, cache)?));
    }
    if config.builtin {
        sources.push(Arc::new(StaticSource::builtin()));
    }
    if !config.topology_file.as_os_str().is_empty() {
        sources.push(Arc::new(JsonFileSource::new(&config.topology_file)));
    }

    Ok(sources)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = FchConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = FchConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        FchConfig::default()
    });
    tracing::info!(
        listen = %config.network.listen,
        port = config.network.api_port,
        interval_secs = config.refresh.interval().as_secs(),
        "fchd starting"
    );

    // ── Router directory ─────────────────────────────────────────────────────

    let sources = build_sources(&config.routers)?;
    if sources.is_empty() {
        tracing::warn!("no router sources configured");
    }
    let directory = RouterDirectory::new(sources);
    tracing::info!(routers = directory.len(), "router directory ready");

    // ── Probe services ───────────────────────────────────────────────────────

    let probe = ProbeDispatcher::from_config(&config.probe).context("invalid probe service URI")?;
    for transport in TransportType::ALL {
        if !probe.handles(transport) {
            tracing::warn!(%transport, "no probe service configured, probes will fail");
        }
    }

    let store = AvailabilityStore::new();
    let refresher = AvailabilityRefresher::new(
        Arc::new(directory.clone()),
        Arc::new(probe),
        store.clone(),
        RefreshSettings::from(&config.refresh),
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let directory_task = tokio::spawn(
        DirectoryRefresher::new(
            directory.clone(),
            Duration::from_secs(config.routers.testbed_refresh_secs).max(MIN_DIRECTORY_REFRESH),
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    let refresher_task = tokio::spawn(refresher.run(shutdown_tx.subscribe()));

    let api_task = {
        let state = ApiState {
            store,
            directory: Arc::new(directory),
        };
        let listen = config.network.listen.clone();
        let port = config.network.api_port;
        tokio::spawn(async move {
            if let Err(e) = fch_api::serve(state, &listen, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = directory_task      => tracing::error!("directory refresher exited: {:?}", r),
        r = refresher_task      => tracing::error!("availability refresher exited: {:?}", r),
        r = api_task            => tracing::error!("API task exited: {:?}", r),
    }

    Ok(())
}
