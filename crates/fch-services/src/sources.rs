//! Router sources: built-in list, operator JSON file, and the testbed
//! status endpoint.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use fch_core::transport::{DEFAULT_UDP_PORT, DEFAULT_WEBSOCKET_PORT};
use fch_core::{LonLat, Router};

use crate::directory::RouterSource;

// ── Static list ───────────────────────────────────────────────────────────────

/// A fixed list of routers.
pub struct StaticSource {
    name: String,
    routers: Vec<Router>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, routers: Vec<Router>) -> Self {
        Self {
            name: name.into(),
            routers,
        }
    }

    /// QUIC and WebSocket gateways operated outside the testbed.
    pub fn builtin() -> Self {
        Self::new("builtin", builtin_routers())
    }
}

#[async_trait::async_trait]
impl RouterSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial(&self) -> Option<Vec<Router>> {
        Some(self.routers.clone())
    }

    async fn fetch(&self) -> Result<Vec<Router>> {
        Ok(self.routers.clone())
    }
}

fn quic_router(code: &str, position: LonLat, ipv4: bool, ipv6: bool, port: u16) -> Router {
    Router {
        id: format!("yoursunny-quic-{}", code),
        position,
        prefix: format!("/yoursunny/_/{}", code),
        host: format!("{}.quic.g.ndn.today", code),
        ipv4,
        ipv6,
        http3_port: port,
        ..Router::default()
    }
}

pub fn builtin_routers() -> Vec<Router> {
    vec![
        quic_router("lax", LonLat(-118.2437, 34.0522), true, false, 6367),
        quic_router("dal", LonLat(-96.7970, 32.7767), true, true, 6367),
        quic_router("mia", LonLat(-80.1918, 25.7617), true, true, 6367),
        quic_router("buf", LonLat(-78.8784, 42.8864), true, false, 6367),
        quic_router("lil", LonLat(3.1778, 50.6927), true, true, 6367),
        Router {
            id: "yoursunny-ws-muc".into(),
            position: LonLat(11.5820, 48.1351),
            prefix: "/yoursunny/_/muc".into(),
            host: "muc.ws.g.ndn.today".into(),
            ipv6: true,
            websocket_port: DEFAULT_WEBSOCKET_PORT,
            ..Router::default()
        },
        quic_router("waw", LonLat(21.0122, 52.2297), false, true, 10207),
        quic_router("sin", LonLat(103.8198, 1.3521), true, true, 6367),
        quic_router("nrt", LonLat(139.7690, 35.6804), true, true, 6367),
    ]
}

// ── JSON file ─────────────────────────────────────────────────────────────────

/// Operator-maintained JSON array of routers, re-read on every refresh.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn read_router_file(path: &Path) -> Result<Vec<Router>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[async_trait::async_trait]
impl RouterSource for JsonFileSource {
    fn name(&self) -> &str {
        "topology-file"
    }

    fn initial(&self) -> Option<Vec<Router>> {
        match read_router_file(&self.path) {
            Ok(routers) => Some(routers),
            Err(e) => {
                tracing::warn!(error = %e, "topology file not loaded");
                None
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Router>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

// ── Testbed ───────────────────────────────────────────────────────────────────

/// One entry of the testbed `testbed-nodes.json` map.
#[derive(Debug, Deserialize)]
struct TestbedNode {
    #[serde(default)]
    shortname: String,
    #[serde(default)]
    site: String,
    #[serde(default)]
    ip_addresses: Vec<String>,
    #[serde(default)]
    position: Vec<f64>,
    #[serde(default, rename = "_real_position")]
    real_position: Vec<f64>,
    #[serde(default)]
    prefix: String,
    #[serde(default, rename = "fch-enabled")]
    fch_enabled: bool,
    #[serde(default)]
    neighbors: serde_json::Value,
}

impl TestbedNode {
    fn into_router(self) -> Option<Router> {
        if !self.fch_enabled {
            return None;
        }

        let site = Url::parse(&self.site).ok()?;
        let host = match site.host()? {
            url::Host::Domain(d) => d.to_string(),
            url::Host::Ipv4(a) => a.to_string(),
            url::Host::Ipv6(a) => a.to_string(),
        };

        let position = match (self.real_position.as_slice(), self.position.as_slice()) {
            ([lon, lat], _) | (_, [lon, lat]) => LonLat(*lon, *lat),
            _ => return None,
        };

        let (mut ipv4, mut ipv6) = (false, false);
        for ip in self.ip_addresses.iter().filter_map(|s| s.parse::<std::net::IpAddr>().ok()) {
            ipv4 |= ip.is_ipv4();
            ipv6 |= ip.is_ipv6();
        }
        if !ipv4 && !ipv6 {
            return None;
        }

        let neighbors = match self.neighbors {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            serde_json::Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
            _ => Vec::new(),
        };

        Some(Router {
            id: self.shortname,
            position,
            prefix: self.prefix.trim_start_matches("ndn:").to_string(),
            host,
            ipv4,
            ipv6,
            udp_port: DEFAULT_UDP_PORT,
            websocket_port: DEFAULT_WEBSOCKET_PORT,
            http3_port: 0,
            neighbors,
        })
    }
}

/// Parse `testbed-nodes.json`, keeping only nodes that opted into FCH.
pub fn parse_testbed_nodes(body: &[u8]) -> Result<Vec<Router>> {
    let nodes: BTreeMap<String, TestbedNode> =
        serde_json::from_slice(body).context("invalid testbed nodes JSON")?;
    Ok(nodes
        .into_values()
        .filter_map(TestbedNode::into_router)
        .filter(|r| !r.id.is_empty())
        .collect())
}

/// Testbed status endpoint, with the last good list cached on disk.
pub struct TestbedSource {
    uri: String,
    cache_path: Option<PathBuf>,
    http: reqwest::Client,
}

impl TestbedSource {
    pub fn new(uri: impl Into<String>, cache_path: Option<PathBuf>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            uri: uri.into(),
            cache_path,
            http,
        })
    }

    fn load_cache(&self) -> Result<Option<Vec<Router>>> {
        match &self.cache_path {
            Some(path) if path.exists() => read_router_file(path).map(Some),
            _ => Ok(None),
        }
    }

    /// Writes are atomic: write to temp file, then rename.
    fn save_cache(&self, routers: &[Router]) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache dir: {}", parent.display()))?;
        }

        let json = serde_json::to_vec(routers).context("failed to serialize routers")?;
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)
                .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
            file.write_all(&json).context("failed to write router cache")?;
            file.sync_all().context("failed to sync router cache")?;
        }
        fs::rename(&tmp_path, path).with_context(|| {
            format!("failed to rename {} to {}", tmp_path.display(), path.display())
        })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RouterSource for TestbedSource {
    fn name(&self) -> &str {
        "testbed"
    }

    fn initial(&self) -> Option<Vec<Router>> {
        match self.load_cache() {
            Ok(routers) => routers,
            Err(e) => {
                tracing::warn!(error = %e, "testbed cache not loaded");
                None
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Router>> {
        let response = self
            .http
            .get(&self.uri)
            .send()
            .await
            .with_context(|| format!("failed to fetch {}", self.uri))?;
        if !response.status().is_success() {
            bail!("{} returned {}", self.uri, response.status());
        }
        let body = response.bytes().await.context("failed to read testbed nodes")?;
        let routers = parse_testbed_nodes(&body)?;

        if let Err(e) = self.save_cache(&routers) {
            tracing::warn!(error = %e, "failed to save testbed cache");
        }
        Ok(routers)
    }
}
