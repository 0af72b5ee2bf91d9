//! Router availability and published snapshots.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::router::Router;
use crate::transport::TransportIpFamily;

/// A router together with the combinations currently believed reachable.
///
/// Absent from `available` = not verified reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterAvailability {
    #[serde(flatten)]
    pub router: Router,
    pub available: BTreeSet<TransportIpFamily>,
}

impl RouterAvailability {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            available: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.router.id
    }

    pub fn prefix(&self) -> &str {
        &self.router.prefix
    }

    pub fn is_available(&self, tf: TransportIpFamily) -> bool {
        self.available.contains(&tf)
    }

    /// Record a verdict. A positive verdict is ignored for combinations the
    /// router does not advertise.
    pub fn set(&mut self, tf: TransportIpFamily, ok: bool) {
        if ok && self.router.connect_string(tf).is_some() {
            self.available.insert(tf);
        } else {
            self.available.remove(&tf);
        }
    }

    pub fn count_available(&self) -> usize {
        self.available.len()
    }
}

/// Point-in-time availability view. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub routers: Vec<RouterAvailability>,
    pub updated: DateTime<Utc>,
}

impl AvailabilitySnapshot {
    pub fn new(routers: Vec<RouterAvailability>, updated: DateTime<Utc>) -> Self {
        Self { routers, updated }
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    pub fn updated_millis(&self) -> i64 {
        self.updated.timestamp_millis()
    }

    /// `updated` formatted for the Last-Modified header.
    pub fn http_date(&self) -> String {
        self.updated.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }
}
