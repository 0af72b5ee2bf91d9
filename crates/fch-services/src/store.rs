//! Published availability snapshot.
//!
//! Readers clone an `Arc` under a read lock and work on it without holding
//! anything. A publish swaps the `Arc` under the write lock, so a reader sees
//! either the old snapshot or the new one, never a mix.

use std::sync::{Arc, RwLock};

use chrono::Duration;

use fch_core::AvailabilitySnapshot;

#[derive(Clone, Default)]
pub struct AvailabilityStore {
    inner: Arc<RwLock<Option<Arc<AvailabilitySnapshot>>>>,
}

impl AvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest snapshot, or `None` before the first publish.
    pub fn current(&self) -> Option<Arc<AvailabilitySnapshot>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the snapshot. `updated` is bumped if needed so it strictly
    /// increases across publishes.
    pub fn publish(&self, mut snapshot: AvailabilitySnapshot) -> Arc<AvailabilitySnapshot> {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(prev) = guard.as_ref() {
            if snapshot.updated <= prev.updated {
                snapshot.updated = prev.updated + Duration::milliseconds(1);
            }
        }
        let snapshot = Arc::new(snapshot);
        *guard = Some(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fch_core::{Router, RouterAvailability};

    fn generation(n: usize) -> AvailabilitySnapshot {
        let routers = (0..n)
            .map(|i| {
                RouterAvailability::new(Router {
                    id: format!("g{}-r{}", n, i),
                    ..Router::default()
                })
            })
            .collect();
        AvailabilitySnapshot::new(routers, Utc::now())
    }

    #[test]
    fn empty_before_first_publish() {
        assert!(AvailabilityStore::new().current().is_none());
    }

    #[test]
    fn updated_strictly_increases() {
        let store = AvailabilityStore::new();
        let t = Utc.with_ymd_and_hms(2021, 10, 30, 0, 0, 0).unwrap();
        let first = store.publish(AvailabilitySnapshot::new(Vec::new(), t));
        let second = store.publish(AvailabilitySnapshot::new(Vec::new(), t));
        assert!(second.updated > first.updated);
        assert_eq!(store.current().unwrap().updated, second.updated);
    }

    #[test]
    fn readers_never_see_a_mixed_snapshot() {
        let store = AvailabilityStore::new();
        store.publish(generation(1));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let snapshot = store.current().unwrap();
                        let n = snapshot.routers.len();
                        let tag = format!("g{}-", n);
                        assert!(snapshot.routers.iter().all(|r| r.id().starts_with(&tag)));
                    }
                })
            })
            .collect();

        for n in 2..200 {
            store.publish(generation(n));
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.current().unwrap().routers.len(), 199);
    }
}
