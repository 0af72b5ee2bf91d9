//! fch-core: router model, availability snapshots, query engine, and configuration.
//! All other ndn-fch crates depend on this one.

pub mod avail;
pub mod config;
pub mod geo;
pub mod query;
pub mod router;
pub mod transport;

pub use avail::{AvailabilitySnapshot, RouterAvailability};
pub use geo::{distance_km, LonLat};
pub use query::{execute_queries, parse_queries, Query, QueryError, QueryResponse};
pub use router::Router;
pub use transport::{IpFamily, TransportIpFamily, TransportType, TRANSPORT_IP_FAMILIES};
