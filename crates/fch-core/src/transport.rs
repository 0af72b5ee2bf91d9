//! Transports, IP families, and their combinations.
//!
//! A `TransportIpFamily` is the unit of probing and of availability:
//!   udp4, udp6, wss-ipv4, wss-ipv6, http3-ipv4, http3-ipv6

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default UDP port; a router on this port gets the bare-host legacy syntax.
pub const DEFAULT_UDP_PORT: u16 = 6363;
/// Default secure WebSocket port; a router on this port gets the bare-host legacy syntax.
pub const DEFAULT_WEBSOCKET_PORT: u16 = 443;

/// A way to reach a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportType {
    #[serde(rename = "udp")]
    Udp,
    #[serde(rename = "wss")]
    WebSocket,
    #[serde(rename = "http3")]
    Http3,
}

impl TransportType {
    pub const ALL: [TransportType; 3] = [
        TransportType::Udp,
        TransportType::WebSocket,
        TransportType::Http3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Udp => "udp",
            TransportType::WebSocket => "wss",
            TransportType::Http3 => "http3",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transport: {0:?}")]
pub struct UnknownTransport(pub String);

impl FromStr for TransportType {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(TransportType::Udp),
            "wss" => Ok(TransportType::WebSocket),
            "http3" => Ok(TransportType::Http3),
            other => Err(UnknownTransport(other.to_string())),
        }
    }
}

/// IP address family. Serialized as the number 4 or 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub const ALL: [IpFamily; 2] = [IpFamily::V4, IpFamily::V6];

    pub fn number(&self) -> u8 {
        match self {
            IpFamily::V4 => 4,
            IpFamily::V6 => 6,
        }
    }
}

impl From<IpFamily> for u8 {
    fn from(family: IpFamily) -> u8 {
        family.number()
    }
}

impl TryFrom<u8> for IpFamily {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            4 => Ok(IpFamily::V4),
            6 => Ok(IpFamily::V6),
            other => Err(format!("unknown IP family {}", other)),
        }
    }
}

/// Combination of transport and IP family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportIpFamily {
    pub transport: TransportType,
    pub family: IpFamily,
}

/// Every known combination, transport-major.
pub const TRANSPORT_IP_FAMILIES: [TransportIpFamily; 6] = [
    TransportIpFamily::new(TransportType::Udp, IpFamily::V4),
    TransportIpFamily::new(TransportType::Udp, IpFamily::V6),
    TransportIpFamily::new(TransportType::WebSocket, IpFamily::V4),
    TransportIpFamily::new(TransportType::WebSocket, IpFamily::V6),
    TransportIpFamily::new(TransportType::Http3, IpFamily::V4),
    TransportIpFamily::new(TransportType::Http3, IpFamily::V6),
];

impl TransportIpFamily {
    pub const fn new(transport: TransportType, family: IpFamily) -> Self {
        Self { transport, family }
    }
}

impl fmt::Display for TransportIpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport {
            TransportType::Udp => write!(f, "{}{}", self.transport, self.family.number()),
            _ => write!(f, "{}-ipv{}", self.transport, self.family.number()),
        }
    }
}

impl FromStr for TransportIpFamily {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TRANSPORT_IP_FAMILIES
            .iter()
            .find(|tf| tf.to_string() == s)
            .copied()
            .ok_or_else(|| UnknownTransport(s.to_string()))
    }
}

impl Serialize for TransportIpFamily {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransportIpFamily {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
