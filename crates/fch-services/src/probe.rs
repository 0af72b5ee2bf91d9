//! Health probe contract: requests, responses, and result merging.
//!
//! A probe asks an external health service to connect to one router over
//! one transport and IP family, then ping a handful of names through it.
//! How the service does that is its own business; this module only defines
//! what goes in, what comes out, and how repeated attempts are combined.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use fch_core::{IpFamily, TransportIpFamily, TransportType};

/// Request for one router over one transport and IP family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProbeRequest {
    pub transport: TransportType,
    pub family: IpFamily,
    /// Router connection string.
    pub router: String,
    /// Names to ping through the router.
    pub names: Vec<String>,
}

impl ProbeRequest {
    pub fn transport_ip_family(&self) -> TransportIpFamily {
        TransportIpFamily::new(self.transport, self.family)
    }
}

/// Outcome for a single target (ping name or router ID).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub ok: bool,
    /// Round-trip time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ProbeResult {
    pub fn success(rtt: f64) -> Self {
        Self {
            ok: true,
            rtt: Some(rtt),
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            rtt: None,
            error: error.into(),
        }
    }
}

/// Per-target results of one probe attempt, keyed by target.
pub type ProbeResults = BTreeMap<String, ProbeResult>;

/// Response from the health service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProbeResponse {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connect_error: String,
    #[serde(default)]
    pub probes: ProbeResults,
}

impl ProbeResponse {
    pub fn count(&self) -> (usize, usize) {
        count(&self.probes)
    }
}

/// Number of successful and failed targets.
pub fn count(results: &ProbeResults) -> (usize, usize) {
    let success = results.values().filter(|r| r.ok).count();
    (success, results.len() - success)
}

/// Merge repeated attempts into the best known result per target.
///
/// Any success wins, with the lowest RTT among successes. A target that only
/// ever failed keeps the first error seen.
pub fn merge<'a>(attempts: impl IntoIterator<Item = &'a ProbeResults>) -> ProbeResults {
    let mut best = ProbeResults::new();
    for results in attempts {
        for (id, res) in results {
            let Some(prev) = best.get_mut(id) else {
                best.insert(id.clone(), res.clone());
                continue;
            };
            match (prev.ok, res.ok) {
                (true, true) => {
                    prev.rtt = match (prev.rtt, res.rtt) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
                (false, true) => *prev = res.clone(),
                (_, false) => {}
            }
        }
    }
    best
}

/// Majority-with-margin rule: reachable iff `success * 2 > failure`.
pub fn verdict(success: usize, failure: usize) -> bool {
    success * 2 > failure
}

/// A service that can probe router health.
#[async_trait::async_trait]
pub trait ProbeService: Send + Sync {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse>;
}
