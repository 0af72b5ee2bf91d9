//! HTTP client for the external health probe services.
//!
//! UDP and WebSocket probes go to one service, HTTP/3 probes to another.
//! Both accept a JSON `ProbeRequest` at `<base>/probe` and answer with a
//! JSON `ProbeResponse`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

use fch_core::config::ProbeConfig;
use fch_core::TransportType;

use crate::probe::{ProbeRequest, ProbeResponse, ProbeService};

/// Probe service reached over HTTP.
pub struct HttpProbeClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpProbeClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Self::new_with_client(base, http)
    }

    pub fn new_with_client(base: &str, http: reqwest::Client) -> Result<Self> {
        let endpoint = probe_endpoint(base)?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// `<base>/probe`, keeping any path the base already has.
fn probe_endpoint(base: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid probe URI: {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("probe URI cannot be a base: {}", base))?
        .pop_if_empty()
        .push("probe");
    Ok(url)
}

#[async_trait::async_trait]
impl ProbeService for HttpProbeClient {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .with_context(|| format!("probe request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            bail!("probe service returned {}", status);
        }

        let res: ProbeResponse = response
            .json()
            .await
            .context("invalid probe response")?;

        tracing::trace!(
            router = %request.router,
            transport = %request.transport_ip_family(),
            connected = res.connected,
            "probe response"
        );
        Ok(res)
    }
}

/// Routes each request to the service responsible for its transport.
#[derive(Default)]
pub struct ProbeDispatcher {
    services: HashMap<TransportType, Arc<dyn ProbeService>>,
}

impl ProbeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, transport: TransportType, service: Arc<dyn ProbeService>) -> Self {
        self.services.insert(transport, service);
        self
    }

    /// Build from config. Transports whose service URI is empty are left
    /// unrouted and their probes fail.
    pub fn from_config(config: &ProbeConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut dispatcher = Self::new();

        if !config.udp_wss_uri.is_empty() {
            let client: Arc<dyn ProbeService> =
                Arc::new(HttpProbeClient::new(&config.udp_wss_uri, timeout)?);
            dispatcher = dispatcher
                .with_service(TransportType::Udp, client.clone())
                .with_service(TransportType::WebSocket, client);
        }
        if !config.http3_uri.is_empty() {
            let client = Arc::new(HttpProbeClient::new(&config.http3_uri, timeout)?);
            dispatcher = dispatcher.with_service(TransportType::Http3, client);
        }
        Ok(dispatcher)
    }

    pub fn handles(&self, transport: TransportType) -> bool {
        self.services.contains_key(&transport)
    }
}

#[async_trait::async_trait]
impl ProbeService for ProbeDispatcher {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        match self.services.get(&request.transport) {
            Some(service) => service.probe(request).await,
            None => bail!("no probe service for {}", request.transport),
        }
    }
}
