//! Availability refresher: periodic health-probe cycles.
//!
//! One cycle:
//!   1. Copy the router list and shuffle the probing order
//!   2. Pick ping destinations from last cycle's verified routers
//!   3. Seed the new map with last cycle's bits (carry-forward)
//!   4. Dispatch one probe task per router × transport/family, paced
//!   5. Collect verdicts through a single collector task
//!   6. Publish the map as a new snapshot
//!
//! A probe that errors or misses the deadline yields no verdict, so the
//! carried-forward bit stays. Only an explicit verdict flips availability.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use fch_core::config::{PartialPolicy, RefreshConfig, MIN_REFRESH_INTERVAL};
use fch_core::{
    AvailabilitySnapshot, Router, RouterAvailability, TransportIpFamily, TRANSPORT_IP_FAMILIES,
};

use crate::directory::RouterList;
use crate::probe::{self, ProbeRequest, ProbeService};
use crate::store::AvailabilityStore;

/// Delay between startup and the first cycle.
const START_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub max_names: usize,
    pub probe_attempts: usize,
    pub max_step: Duration,
    pub partial_policy: PartialPolicy,
}

impl From<&RefreshConfig> for RefreshSettings {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            interval: config.interval(),
            max_names: config.max_names.max(1),
            probe_attempts: config.probe_attempts.max(1),
            max_step: Duration::from_millis(config.max_step_ms),
            partial_policy: config.partial_policy,
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("router list is empty")]
    NoRouters,
    #[error("no ping destinations")]
    NoDestinations,
    #[error("no usable probe response for {}", .0.join(", "))]
    IncompleteGroups(Vec<String>),
    #[error("verdict collector failed: {0}")]
    Collector(String),
}

/// Verdict for one router and transport/family.
struct Verdict {
    id: String,
    tf: TransportIpFamily,
    ok: bool,
}

struct Collected {
    avail: HashMap<String, RouterAvailability>,
    /// Groups that produced at least one verdict.
    answered: HashSet<TransportIpFamily>,
}

pub struct AvailabilityRefresher {
    routers: Arc<dyn RouterList>,
    probe: Arc<dyn ProbeService>,
    store: AvailabilityStore,
    settings: RefreshSettings,
}

impl AvailabilityRefresher {
    pub fn new(
        routers: Arc<dyn RouterList>,
        probe: Arc<dyn ProbeService>,
        store: AvailabilityStore,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            routers,
            probe,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &AvailabilityStore {
        &self.store
    }

    /// Run one cycle, bounded by 90% of the interval.
    pub async fn refresh_once(&self) -> Result<Arc<AvailabilitySnapshot>, CycleError> {
        let deadline = Instant::now() + self.settings.interval * 9 / 10;
        self.refresh_until(deadline).await
    }

    async fn refresh_until(
        &self,
        deadline: Instant,
    ) -> Result<Arc<AvailabilitySnapshot>, CycleError> {
        let mut routers = self.routers.list();
        let mut seen = HashSet::new();
        routers.retain(|r| seen.insert(r.id.clone()));
        if routers.is_empty() {
            return Err(CycleError::NoRouters);
        }

        let previous = self.store.current();
        let destinations = select_destinations(previous.as_deref(), &routers);
        if destinations.is_empty() {
            return Err(CycleError::NoDestinations);
        }

        // Snapshot keeps directory order; probing order is random.
        let order: Vec<String> = routers.iter().map(|r| r.id.clone()).collect();
        let avail = seed_availability(previous.as_deref(), &routers);
        routers.shuffle(&mut rand::thread_rng());

        let (tx, rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(collect(avail, rx));

        let step = pacing_step(self.settings.interval, self.settings.max_step, routers.len());
        let expected: HashSet<TransportIpFamily> =
            routers.iter().flat_map(|r| r.advertised()).collect();
        let mut tasks = JoinSet::new();

        'dispatch: for router in &routers {
            for tf in TRANSPORT_IP_FAMILIES {
                let Some(connect) = router.connect_string(tf) else {
                    continue;
                };
                if Instant::now() + step >= deadline {
                    tracing::warn!("refresh deadline reached before all probes were dispatched");
                    break 'dispatch;
                }
                tokio::time::sleep(step).await;

                let request = ProbeRequest {
                    transport: tf.transport,
                    family: tf.family,
                    router: connect,
                    names: ping_names(&destinations, self.settings.max_names),
                };
                tasks.spawn(probe_one(
                    self.probe.clone(),
                    router.id.clone(),
                    request,
                    self.settings.probe_attempts,
                    deadline,
                    tx.clone(),
                ));
            }
        }
        drop(tx);

        let drained = tokio::time::timeout_at(deadline, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = tasks.len(), "refresh deadline reached, abandoning probes");
        }
        tasks.shutdown().await;

        let collected = collector
            .await
            .map_err(|e| CycleError::Collector(e.to_string()))?;

        if self.settings.partial_policy == PartialPolicy::Discard {
            let mut missing: Vec<String> = expected
                .iter()
                .filter(|tf| !collected.answered.contains(*tf))
                .map(|tf| tf.to_string())
                .collect();
            if !missing.is_empty() {
                missing.sort();
                return Err(CycleError::IncompleteGroups(missing));
            }
        }

        let mut avail = collected.avail;
        let list = order.iter().filter_map(|id| avail.remove(id)).collect();
        Ok(self
            .store
            .publish(AvailabilitySnapshot::new(list, Utc::now())))
    }

    /// Wait a moment, run a cycle, then one per interval tick with jitter.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        self.settings.interval = self.settings.interval.max(MIN_REFRESH_INTERVAL);
        let interval = self.settings.interval;
        tracing::info!(interval_secs = interval.as_secs(), "availability refresher starting");

        tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            _ = tokio::time::sleep(START_DELAY) => {}
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("availability refresher shutting down");
                    return Ok(());
                }

                _ = self.cycle() => {}
            }

            let jitter = interval.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("availability refresher shutting down");
                    return Ok(());
                }

                _ = async {
                    ticker.tick().await;
                    tokio::time::sleep(jitter).await;
                } => {}
            }
        }
    }

    async fn cycle(&self) {
        let t0 = Instant::now();
        match self.refresh_once().await {
            Ok(snapshot) => {
                let available = snapshot
                    .routers
                    .iter()
                    .filter(|r| r.count_available() > 0)
                    .count();
                tracing::info!(
                    routers = snapshot.routers.len(),
                    available,
                    duration_ms = t0.elapsed().as_millis() as u64,
                    "availability published"
                );
            }
            Err(e) => tracing::warn!(
                error = %e,
                duration_ms = t0.elapsed().as_millis() as u64,
                "refresh cycle not published"
            ),
        }
    }
}

// ── Cycle helpers ─────────────────────────────────────────────────────────────

/// Prefixes of routers verified last cycle, unless those are no more than
/// half the population; then every router's prefix.
fn select_destinations(previous: Option<&AvailabilitySnapshot>, routers: &[Router]) -> Vec<String> {
    let verified: Vec<String> = previous
        .map(|s| {
            s.routers
                .iter()
                .filter(|r| r.count_available() > 0 && !r.prefix().is_empty())
                .map(|r| r.prefix().to_string())
                .collect()
        })
        .unwrap_or_default();
    if verified.len() > routers.len() / 2 {
        return verified;
    }
    routers
        .iter()
        .filter(|r| !r.prefix.is_empty())
        .map(|r| r.prefix.clone())
        .collect()
}

/// New map with last cycle's bits, for routers still listed.
fn seed_availability(
    previous: Option<&AvailabilitySnapshot>,
    routers: &[Router],
) -> HashMap<String, RouterAvailability> {
    let mut avail: HashMap<String, RouterAvailability> = routers
        .iter()
        .map(|r| (r.id.clone(), RouterAvailability::new(r.clone())))
        .collect();
    for old in previous.into_iter().flat_map(|s| &s.routers) {
        if let Some(entry) = avail.get_mut(old.id()) {
            for tf in &old.available {
                entry.set(*tf, true);
            }
        }
    }
    avail
}

fn pacing_step(interval: Duration, max_step: Duration, routers: usize) -> Duration {
    let slots = (routers * TRANSPORT_IP_FAMILIES.len()).max(1) as u32;
    max_step.min(interval / slots)
}

/// `<dest>/ping/<random>` for a random subset of at most `max` destinations.
fn ping_names(destinations: &[String], max: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    destinations
        .choose_multiple(&mut rng, max)
        .map(|dest| format!("{}/ping/{}", dest.trim_end_matches('/'), rng.gen::<u32>()))
        .collect()
}

async fn collect(
    mut avail: HashMap<String, RouterAvailability>,
    mut rx: mpsc::UnboundedReceiver<Verdict>,
) -> Collected {
    let mut answered = HashSet::new();
    while let Some(v) = rx.recv().await {
        answered.insert(v.tf);
        if let Some(entry) = avail.get_mut(&v.id) {
            entry.set(v.tf, v.ok);
        }
    }
    Collected { avail, answered }
}

async fn probe_one(
    service: Arc<dyn ProbeService>,
    id: String,
    request: ProbeRequest,
    attempts: usize,
    deadline: Instant,
    tx: mpsc::UnboundedSender<Verdict>,
) {
    let tf = request.transport_ip_family();
    match tokio::time::timeout_at(deadline, probe_verdict(service.as_ref(), &request, attempts)).await
    {
        Ok(Some(ok)) => {
            let _ = tx.send(Verdict { id, tf, ok });
        }
        Ok(None) => {}
        Err(_) => tracing::warn!(
            transport = %tf,
            router = %request.router,
            "probe deadline exceeded"
        ),
    }
}

/// `None` when every attempt failed at the transport level.
async fn probe_verdict(
    service: &dyn ProbeService,
    request: &ProbeRequest,
    attempts: usize,
) -> Option<bool> {
    let tf = request.transport_ip_family();
    let mut answered = false;
    let mut results = Vec::new();

    for attempt in 0..attempts.max(1) {
        match service.probe(request).await {
            Ok(res) if res.connected => {
                answered = true;
                results.push(res.probes);
            }
            Ok(res) => {
                answered = true;
                tracing::debug!(
                    transport = %tf,
                    router = %request.router,
                    attempt,
                    connect_error = %res.connect_error,
                    "router not connected"
                );
            }
            Err(e) => tracing::warn!(
                transport = %tf,
                router = %request.router,
                attempt,
                error = %e,
                "probe error"
            ),
        }
    }

    if !answered {
        return None;
    }
    if results.is_empty() {
        return Some(false);
    }

    let merged = probe::merge(&results);
    let (success, failure) = probe::count(&merged);
    let ok = probe::verdict(success, failure);
    tracing::debug!(
        transport = %tf,
        router = %request.router,
        names = ?request.names,
        success,
        failure,
        verdict = ok,
        "probe response"
    );
    Some(ok)
}
