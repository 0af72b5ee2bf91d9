//! Router directory: aggregates router sources into one list.
//!
//! Each source keeps its own last good list. A failed refresh leaves that
//! list in place, so a flaky testbed endpoint never empties the directory.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::broadcast;

use fch_core::Router;

/// Anything that can hand out the current router population.
pub trait RouterList: Send + Sync {
    /// A copy of the current routers. IDs are unique.
    fn list(&self) -> Vec<Router>;
}

impl RouterList for Vec<Router> {
    fn list(&self) -> Vec<Router> {
        self.clone()
    }
}

/// A provider of router descriptors.
#[async_trait::async_trait]
pub trait RouterSource: Send + Sync {
    fn name(&self) -> &str;

    /// Routers usable before the first fetch completes, e.g. from a cache.
    fn initial(&self) -> Option<Vec<Router>> {
        None
    }

    async fn fetch(&self) -> Result<Vec<Router>>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("router sources failed: {}", .0.join(", "))]
    SourcesFailed(Vec<String>),
}

/// Router directory, shared between the refresher and the API.
#[derive(Clone)]
pub struct RouterDirectory {
    sources: Arc<Vec<Arc<dyn RouterSource>>>,
    /// Last good list per source index.
    lists: Arc<DashMap<usize, Vec<Router>>>,
}

impl RouterDirectory {
    pub fn new(sources: Vec<Arc<dyn RouterSource>>) -> Self {
        let lists = DashMap::new();
        for (i, source) in sources.iter().enumerate() {
            if let Some(routers) = source.initial() {
                tracing::debug!(source = source.name(), count = routers.len(), "initial routers");
                lists.insert(i, routers);
            }
        }
        Self {
            sources: Arc::new(sources),
            lists: Arc::new(lists),
        }
    }

    /// Fetch every source once. Sources that fail keep their previous list.
    pub async fn refresh_once(&self) -> Result<usize, DirectoryError> {
        let mut failed = Vec::new();
        for (i, source) in self.sources.iter().enumerate() {
            match source.fetch().await {
                Ok(routers) => {
                    tracing::debug!(source = source.name(), count = routers.len(), "routers fetched");
                    self.lists.insert(i, routers);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "router source refresh failed");
                    failed.push(source.name().to_string());
                }
            }
        }
        if failed.is_empty() {
            Ok(self.len())
        } else {
            Err(DirectoryError::SourcesFailed(failed))
        }
    }

    /// Number of distinct router IDs across all sources.
    pub fn len(&self) -> usize {
        let mut ids = HashSet::new();
        for entry in self.lists.iter() {
            ids.extend(entry.value().iter().map(|r| r.id.clone()));
        }
        ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|entry| entry.value().is_empty())
    }
}

impl RouterList for RouterDirectory {
    /// Routers in source order. A duplicate ID keeps the first occurrence.
    fn list(&self) -> Vec<Router> {
        let mut seen = HashSet::new();
        let mut routers = Vec::new();
        for i in 0..self.sources.len() {
            let Some(list) = self.lists.get(&i) else {
                continue;
            };
            for router in list.value() {
                if seen.insert(router.id.clone()) {
                    routers.push(router.clone());
                } else {
                    tracing::debug!(id = %router.id, "duplicate router ID skipped");
                }
            }
        }
        routers
    }
}

/// Periodic directory refresh.
pub struct DirectoryRefresher {
    directory: RouterDirectory,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl DirectoryRefresher {
    pub fn new(
        directory: RouterDirectory,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            directory,
            interval,
            shutdown,
        }
    }

    /// Refresh now, then every interval plus up to 10% jitter.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            match self.directory.refresh_once().await {
                Ok(count) => tracing::info!(count, "router directory refreshed"),
                Err(e) => tracing::warn!(error = %e, "router directory partially refreshed"),
            }

            let jitter = self.interval.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("router directory refresher shutting down");
                    return Ok(());
                }

                _ = tokio::time::sleep(self.interval + jitter) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn router(id: &str) -> Router {
        Router {
            id: id.into(),
            host: format!("{}.example.net", id),
            ipv4: true,
            udp_port: 6363,
            ..Router::default()
        }
    }

    struct Flaky {
        fail: AtomicBool,
        routers: Vec<Router>,
    }

    #[async_trait::async_trait]
    impl RouterSource for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self) -> Result<Vec<Router>> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("endpoint down");
            }
            Ok(self.routers.clone())
        }
    }

    #[tokio::test]
    async fn failed_source_keeps_previous_list() {
        let flaky = Arc::new(Flaky {
            fail: AtomicBool::new(false),
            routers: vec![router("a"), router("b")],
        });
        let directory = RouterDirectory::new(vec![flaky.clone() as Arc<dyn RouterSource>]);
        assert!(directory.is_empty());

        assert_eq!(directory.refresh_once().await.unwrap(), 2);

        flaky.fail.store(true, Ordering::SeqCst);
        let err = directory.refresh_once().await.unwrap_err();
        assert!(err.to_string().contains("flaky"));
        assert_eq!(directory.len(), 2);
    }

    #[tokio::test]
    async fn sources_are_concatenated_in_order_without_duplicates() {
        let first: Arc<dyn RouterSource> = Arc::new(crate::sources::StaticSource::new(
            "first",
            vec![router("a"), router("b")],
        ));
        let second: Arc<dyn RouterSource> = Arc::new(crate::sources::StaticSource::new(
            "second",
            vec![router("b"), router("c")],
        ));
        let directory = RouterDirectory::new(vec![first, second]);

        let ids: Vec<String> = directory.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(directory.len(), 3);
        assert!(!directory.is_empty());
    }

    #[tokio::test]
    async fn refresher_stops_on_shutdown() {
        let directory = RouterDirectory::new(Vec::new());
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(
            DirectoryRefresher::new(directory, Duration::from_secs(3600), rx).run(),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
    }
}
