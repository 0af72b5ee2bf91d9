//! Query parsing, filtering, and distance ranking.
//!
//! A query string may carry several clauses:
//!
//!   ?cap=udp&cap=http3&k=2&lon=121.47&lat=31.23&network=ndn
//!
//! `cap` and `k` are parallel arrays; `k` values are reused cyclically.

use serde::{Deserialize, Serialize};

use crate::avail::{AvailabilitySnapshot, RouterAvailability};
use crate::geo::{distance_km, LonLat};
use crate::transport::{IpFamily, TransportIpFamily, TransportType};

/// One clause of an API query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub count: usize,
    pub transport: TransportType,
    pub ipv4: bool,
    pub ipv6: bool,
    /// Network filter in `/segment` form.
    pub network: Option<String>,
    pub position: LonLat,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            count: 1,
            transport: TransportType::Udp,
            ipv4: true,
            ipv6: true,
            network: None,
            position: LonLat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// No refresh cycle has completed yet; retry later.
    #[error("router availability is not known yet")]
    Unavailable,
}

impl Query {
    /// Families requested by this clause, IPv4 first.
    fn families(&self) -> impl Iterator<Item = IpFamily> {
        let v4 = self.ipv4.then_some(IpFamily::V4);
        let v6 = self.ipv6.then_some(IpFamily::V6);
        v4.into_iter().chain(v6)
    }

    fn match_transport(&self, router: &RouterAvailability) -> bool {
        self.families()
            .any(|af| router.is_available(TransportIpFamily::new(self.transport, af)))
    }

    fn match_network(&self, router: &RouterAvailability) -> bool {
        match &self.network {
            None => true,
            Some(network) => {
                let prefix = router.prefix();
                prefix == network
                    || (prefix.starts_with(network.as_str())
                        && prefix[network.len()..].starts_with('/'))
            }
        }
    }

    pub fn matches(&self, router: &RouterAvailability) -> bool {
        self.match_transport(router) && self.match_network(router)
    }

    /// Matching routers, nearest first, at most `count`.
    ///
    /// Equal distances keep their order in `avail`.
    pub fn execute<'a>(&self, avail: &'a [RouterAvailability]) -> Vec<&'a RouterAvailability> {
        let mut ranked: Vec<(f64, &RouterAvailability)> = avail
            .iter()
            .filter(|r| self.matches(r))
            .map(|r| (distance_km(self.position, r.router.position), r))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(self.count);
        ranked.into_iter().map(|(_, r)| r).collect()
    }

    /// Connection string for a selected router, if it advertises the
    /// transport on a requested family. Both families share one host name,
    /// so the string itself does not depend on the family.
    pub fn resolve(&self, router: &RouterAvailability, legacy: bool) -> Option<String> {
        let advertised = self.families().any(|af| {
            router
                .router
                .connect_string(TransportIpFamily::new(self.transport, af))
                .is_some()
        });
        if !advertised {
            return None;
        }
        router.router.transport_string(self.transport, legacy)
    }
}

fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v.as_str())
}

fn all_values<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

/// Parse a raw URL query string into clauses. Never fails: malformed values
/// fall back to defaults.
pub fn parse_queries(qs: &str) -> Vec<Query> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(qs.as_bytes())
        .into_owned()
        .collect();
    let first = |key: &str| first_value(&pairs, key);

    let mut base = Query {
        ipv4: first("ipv4") != Some("0"),
        ipv6: first("ipv6") != Some("0"),
        ..Query::default()
    };
    base.position.0 = first("lon").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    base.position.1 = first("lat").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    if let Some(network) = first("network").map(|n| n.trim_matches('/')) {
        if !network.is_empty() {
            base.network = Some(format!("/{}", network));
        }
    }

    let mut counts: Vec<usize> = all_values(&pairs, "k")
        .into_iter()
        .map(|n| n.parse::<u32>().unwrap_or(0).max(1) as usize)
        .collect();
    if counts.is_empty() {
        counts.push(1);
    }

    let caps = all_values(&pairs, "cap");
    if caps.is_empty() {
        base.count = counts[0];
        return vec![base];
    }

    caps.iter()
        .enumerate()
        .filter_map(|(i, cap)| {
            let transport = cap.parse().ok()?;
            Some(Query {
                count: counts[i % counts.len()],
                transport,
                ..base.clone()
            })
        })
        .collect()
}

/// API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Last update time, milliseconds since epoch.
    pub updated: i64,
    pub routers: Vec<QueryResponseRouter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponseRouter {
    pub transport: TransportType,
    pub connect: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
}

impl QueryResponse {
    /// Plain-text body: one comma-separated record of connect strings.
    pub fn to_text(&self) -> String {
        let fields: Vec<String> = self.routers.iter().map(|r| csv_field(&r.connect)).collect();
        format!("{}\n", fields.join(","))
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Run every clause against a snapshot and concatenate results in clause order.
pub fn execute_queries(
    queries: &[Query],
    snapshot: Option<&AvailabilitySnapshot>,
    legacy: bool,
) -> Result<QueryResponse, QueryError> {
    let snapshot = snapshot
        .filter(|s| !s.is_empty())
        .ok_or(QueryError::Unavailable)?;

    let mut routers = Vec::new();
    for q in queries {
        for r in q.execute(&snapshot.routers) {
            if let Some(connect) = q.resolve(r, legacy) {
                routers.push(QueryResponseRouter {
                    transport: q.transport,
                    connect,
                    prefix: r.prefix().to_string(),
                });
            }
        }
    }

    Ok(QueryResponse {
        updated: snapshot.updated_millis(),
        routers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use chrono::Utc;

    fn avail(id: &str, position: LonLat, prefix: &str, tfs: &[TransportIpFamily]) -> RouterAvailability {
        let mut ra = RouterAvailability::new(Router {
            id: id.into(),
            position,
            prefix: prefix.into(),
            host: format!("{}.example.net", id),
            ipv4: true,
            ipv6: true,
            udp_port: 6363,
            websocket_port: 443,
            http3_port: 6367,
            neighbors: Vec::new(),
        });
        for tf in tfs {
            ra.set(*tf, true);
        }
        ra
    }

    const UDP4: TransportIpFamily = TransportIpFamily::new(TransportType::Udp, IpFamily::V4);
    const UDP6: TransportIpFamily = TransportIpFamily::new(TransportType::Udp, IpFamily::V6);
    const H3V4: TransportIpFamily = TransportIpFamily::new(TransportType::Http3, IpFamily::V4);

    #[test]
    fn parse_multi_clause() {
        let list = parse_queries("k=2&cap=udp&cap=http3&ipv4=1&ipv6=1&lon=121.4737&lat=31.2304");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].transport, TransportType::Udp);
        assert_eq!(list[1].transport, TransportType::Http3);
        for q in &list {
            assert_eq!(q.count, 2);
            assert!(q.ipv4 && q.ipv6);
            assert!((q.position.lon() - 121.4737).abs() < 1e-4);
            assert!((q.position.lat() - 31.2304).abs() < 1e-4);
        }
    }

    #[test]
    fn parse_defaults() {
        let list = parse_queries("");
        assert_eq!(list, vec![Query::default()]);

        let list = parse_queries("k=abc&ipv6=0&network=/yoursunny/");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].count, 1);
        assert!(list[0].ipv4);
        assert!(!list[0].ipv6);
        assert_eq!(list[0].network.as_deref(), Some("/yoursunny"));
    }

    #[test]
    fn parse_counts_cycle() {
        let list = parse_queries("cap=udp&cap=wss&cap=http3&k=3&k=0");
        let counts: Vec<usize> = list.iter().map(|q| q.count).collect();
        assert_eq!(counts, [3, 1, 3]);
    }

    #[test]
    fn parse_skips_unknown_transport() {
        let list = parse_queries("cap=tcp&cap=wss&k=4&k=5");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].transport, TransportType::WebSocket);
        assert_eq!(list[0].count, 5);
    }

    #[test]
    fn ranking_by_distance() {
        // ~10 km, ~50 km, ~5 km north of the client.
        let client = LonLat(0.0, 0.0);
        let deg = |km: f64| km / 111.195;
        let list = vec![
            avail("ten", LonLat(0.0, deg(10.0)), "/ndn/ten", &[UDP4]),
            avail("fifty", LonLat(0.0, deg(50.0)), "/ndn/fifty", &[UDP4]),
            avail("five", LonLat(0.0, deg(5.0)), "/ndn/five", &[UDP4]),
        ];
        let q = Query {
            count: 2,
            position: client,
            ..Query::default()
        };
        let ids: Vec<&str> = q.execute(&list).iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["five", "ten"]);
    }

    #[test]
    fn equal_distance_keeps_input_order() {
        let p = LonLat(10.0, 10.0);
        let list = vec![
            avail("b", p, "", &[UDP4]),
            avail("a", p, "", &[UDP4]),
            avail("c", p, "", &[UDP4]),
        ];
        let q = Query {
            count: 3,
            ..Query::default()
        };
        let ids: Vec<&str> = q.execute(&list).iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn family_filter_is_either_requested() {
        let list = vec![
            avail("v4", LonLat(1.0, 1.0), "", &[UDP4]),
            avail("v6", LonLat(2.0, 2.0), "", &[UDP6]),
            avail("none", LonLat(0.0, 0.0), "", &[H3V4]),
        ];
        let both = Query {
            count: 10,
            ..Query::default()
        };
        assert_eq!(both.execute(&list).len(), 2);

        let only6 = Query {
            count: 10,
            ipv4: false,
            ..Query::default()
        };
        let ids: Vec<&str> = only6.execute(&list).iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["v6"]);
    }

    #[test]
    fn network_filter_matches_whole_segment() {
        let list = vec![
            avail("a", LonLat(0.0, 0.0), "/yoursunny/_/lax", &[UDP4]),
            avail("b", LonLat(0.0, 0.0), "/yoursunnyx/lax", &[UDP4]),
            avail("c", LonLat(0.0, 0.0), "/ndn/edu/ucla", &[UDP4]),
        ];
        let q = parse_queries("network=yoursunny&k=5").remove(0);
        let ids: Vec<&str> = q.execute(&list).iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[test]
    fn resolve_requires_requested_family() {
        let mut ra = avail("x", LonLat(0.0, 0.0), "", &[UDP6]);
        ra.router.udp_port = 16363;
        let q = Query::default();
        assert_eq!(q.resolve(&ra, false).unwrap(), "x.example.net:16363");

        ra.router.ipv4 = false;
        ra.router.ipv6 = false;
        assert!(q.resolve(&ra, false).is_none());
    }

    #[test]
    fn execute_queries_requires_snapshot() {
        assert_eq!(
            execute_queries(&[Query::default()], None, true),
            Err(QueryError::Unavailable)
        );
        let empty = AvailabilitySnapshot::new(Vec::new(), Utc::now());
        assert_eq!(
            execute_queries(&[Query::default()], Some(&empty), true),
            Err(QueryError::Unavailable)
        );
    }

    #[test]
    fn execute_queries_concatenates_clauses() {
        let snapshot = AvailabilitySnapshot::new(
            vec![
                avail("near", LonLat(0.0, 0.1), "/ndn/near", &[UDP4]),
                avail("far", LonLat(0.0, 5.0), "/ndn/far", &[UDP4, H3V4]),
            ],
            Utc::now(),
        );
        let queries = parse_queries("cap=http3&cap=udp&k=1");
        let res = execute_queries(&queries, Some(&snapshot), true).unwrap();
        let connects: Vec<&str> = res.routers.iter().map(|r| r.connect.as_str()).collect();
        assert_eq!(connects, ["https://far.example.net:6367/ndn", "near.example.net"]);
        assert_eq!(res.routers[1].prefix, "/ndn/near");
        assert_eq!(res.updated, snapshot.updated_millis());
        assert_eq!(
            res.to_text(),
            "https://far.example.net:6367/ndn,near.example.net\n"
        );
    }
}
