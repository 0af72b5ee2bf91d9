//! Router descriptors as supplied by the router directory.

use serde::{Deserialize, Serialize};

use crate::geo::LonLat;
use crate::transport::{
    IpFamily, TransportIpFamily, TransportType, DEFAULT_UDP_PORT, DEFAULT_WEBSOCKET_PORT,
};

/// A network-access router.
///
/// A port of 0 means the transport is not offered. The same `host` name is
/// used for both IP families; `ipv4`/`ipv6` say which families it resolves to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Router {
    pub id: String,
    pub position: LonLat,
    /// Routable name prefix, also used as ping destination. Empty = none.
    #[serde(default)]
    pub prefix: String,

    pub host: String,
    #[serde(default)]
    pub ipv4: bool,
    #[serde(default)]
    pub ipv6: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub udp_port: u16,
    #[serde(default, rename = "wss-port", skip_serializing_if = "is_zero")]
    pub websocket_port: u16,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub http3_port: u16,

    /// IDs of adjacent routers in the overlay topology.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<String>,
}

fn is_zero(port: &u16) -> bool {
    *port == 0
}

impl Router {
    pub fn has_ip_family(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::V4 => self.ipv4,
            IpFamily::V6 => self.ipv6,
        }
    }

    pub fn port(&self, transport: TransportType) -> u16 {
        match transport {
            TransportType::Udp => self.udp_port,
            TransportType::WebSocket => self.websocket_port,
            TransportType::Http3 => self.http3_port,
        }
    }

    /// Connection string for a transport and IP family, or `None` if the
    /// router does not advertise that combination.
    pub fn connect_string(&self, tf: TransportIpFamily) -> Option<String> {
        if !self.has_ip_family(tf.family) {
            return None;
        }
        self.transport_string(tf.transport, false)
    }

    /// Connection string for a transport, ignoring IP family.
    ///
    ///   udp   → host:port, or host when `legacy` and port is 6363
    ///   wss   → wss://host:port/ws/, or host when `legacy` and port is 443
    ///   http3 → https://host:port/ndn
    pub fn transport_string(&self, transport: TransportType, legacy: bool) -> Option<String> {
        let port = self.port(transport);
        if port == 0 {
            return None;
        }
        let s = match transport {
            TransportType::Udp if legacy && port == DEFAULT_UDP_PORT => self.host.clone(),
            TransportType::Udp => join_host_port(&self.host, port),
            TransportType::WebSocket if legacy && port == DEFAULT_WEBSOCKET_PORT => {
                self.host.clone()
            }
            TransportType::WebSocket => format!("wss://{}/ws/", join_host_port(&self.host, port)),
            TransportType::Http3 => format!("https://{}/ndn", join_host_port(&self.host, port)),
        };
        Some(s)
    }

    /// Every combination this router advertises.
    pub fn advertised(&self) -> impl Iterator<Item = TransportIpFamily> + '_ {
        crate::transport::TRANSPORT_IP_FAMILIES
            .into_iter()
            .filter(|tf| self.connect_string(*tf).is_some())
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
