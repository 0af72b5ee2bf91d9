//! ndn-fch integration test harness.
//!
//! Everything runs in-process on loopback: a fake health prober speaking
//! the probe JSON protocol, the refresher probing through the real HTTP
//! client, and the query API bound to an ephemeral port.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::Json;
use tokio::net::TcpListener;

use fch_api::ApiState;
use fch_core::{LonLat, Router};
use fch_services::{
    AvailabilityRefresher, AvailabilityStore, HttpProbeClient, ProbeRequest, ProbeResponse,
    ProbeResult, RefreshSettings, RouterDirectory, RouterList, RouterSource, StaticSource,
};

mod api;
mod cycle;

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub fn router(name: &str, position: LonLat) -> Router {
    Router {
        id: name.to_string(),
        position,
        prefix: format!("/ndn/{}", name),
        host: format!("{}.example.net", name),
        ipv4: true,
        udp_port: 6363,
        websocket_port: 443,
        ..Router::default()
    }
}

/// Paris and Tokyo are healthy, Berlin never connects.
pub fn fixture_routers() -> Vec<Router> {
    vec![
        router("paris", LonLat(2.3522, 48.8566)),
        router("tokyo", LonLat(139.6917, 35.6895)),
        router("berlin", LonLat(13.4050, 52.5200)),
    ]
}

pub fn directory(routers: Vec<Router>) -> RouterDirectory {
    let source: Arc<dyn RouterSource> = Arc::new(StaticSource::new("fixture", routers));
    RouterDirectory::new(vec![source])
}

pub fn settings() -> RefreshSettings {
    RefreshSettings {
        interval: Duration::from_secs(60),
        max_step: Duration::ZERO,
        ..RefreshSettings::default()
    }
}

// ── Fake prober ───────────────────────────────────────────────────────────────

/// Routers whose connect string contains one of these never connect.
#[derive(Clone)]
struct Unreachable(Arc<Vec<String>>);

async fn handle_probe(
    State(down): State<Unreachable>,
    Json(req): Json<ProbeRequest>,
) -> Json<ProbeResponse> {
    if down.0.iter().any(|d| req.router.contains(d.as_str())) {
        return Json(ProbeResponse {
            connected: false,
            connect_error: "connection refused".into(),
            ..ProbeResponse::default()
        });
    }
    Json(ProbeResponse {
        connected: true,
        connect_error: String::new(),
        probes: req
            .names
            .iter()
            .map(|n| (n.clone(), ProbeResult::success(12.0)))
            .collect(),
    })
}

/// Start a prober on loopback. Returns its base URI.
pub async fn start_prober(down: &[&str]) -> Result<String> {
    let state = Unreachable(Arc::new(down.iter().map(|s| s.to_string()).collect()));
    let app = axum::Router::new()
        .route("/probe", axum::routing::post(handle_probe))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(format!("http://{}", addr))
}

/// A loopback URI nothing listens on.
pub async fn dead_uri() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Stack {
    pub base: String,
    pub store: AvailabilityStore,
    pub directory: RouterDirectory,
}

impl Stack {
    /// API over an empty store and the fixture directory.
    pub async fn start() -> Result<Self> {
        let store = AvailabilityStore::new();
        let directory = directory(fixture_routers());
        let state = ApiState {
            store: store.clone(),
            directory: Arc::new(directory.clone()),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(fch_api::serve_on(listener, state));

        Ok(Self {
            base: format!("http://{}", addr),
            store,
            directory,
        })
    }

    /// Refresher publishing into this stack's store, probing via `prober`.
    pub fn refresher(&self, prober: &str) -> Result<AvailabilityRefresher> {
        let client = HttpProbeClient::new(prober, Duration::from_secs(5))
            .context("failed to build probe client")?;
        let routers: Arc<dyn RouterList> = Arc::new(self.directory.clone());
        Ok(AvailabilityRefresher::new(
            routers,
            Arc::new(client),
            self.store.clone(),
            settings(),
        ))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

pub async fn get(url: &str, accept: Option<&str>) -> Result<reqwest::Response> {
    let mut req = reqwest::Client::new().get(url);
    if let Some(accept) = accept {
        req = req.header(reqwest::header::ACCEPT, accept);
    }
    req.send()
        .await
        .with_context(|| format!("GET {} failed", url))
}
