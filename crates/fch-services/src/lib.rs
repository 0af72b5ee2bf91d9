//! fch-services: health probing, router directory, and the availability
//! refresh cycle.

pub mod directory;
pub mod probe;
pub mod probe_client;
pub mod refresher;
pub mod sources;
pub mod store;

pub use directory::{DirectoryError, DirectoryRefresher, RouterDirectory, RouterList, RouterSource};
pub use probe::{ProbeRequest, ProbeResponse, ProbeResult, ProbeResults, ProbeService};
pub use probe_client::{HttpProbeClient, ProbeDispatcher};
pub use refresher::{AvailabilityRefresher, CycleError, RefreshSettings};
pub use sources::{JsonFileSource, StaticSource, TestbedSource};
pub use store::AvailabilityStore;
