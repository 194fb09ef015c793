use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-vehicle mutual exclusion.
///
/// Session mutation, event publication and reaping for one vehicle must not
/// interleave, while different vehicles proceed in parallel. Holding the
/// guard across awaits is fine; entries are removed once the last guard for
/// a vehicle drops.
#[derive(Debug, Clone, Default)]
pub struct VehicleLocks {
    inner: Arc<VehicleLocksInner>,
}

impl VehicleLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, vehicle_id: impl Into<String>) -> VehicleLockGuard {
        let vehicle_id = vehicle_id.into();
        let lock = self
            .inner
            .locks
            .entry(vehicle_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        VehicleLockGuard { vehicle_id, inner: Arc::clone(&self.inner), guard: Some(guard) }
    }
}

#[derive(Debug, Default)]
struct VehicleLocksInner {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

pub struct VehicleLockGuard {
    vehicle_id: String,
    inner: Arc<VehicleLocksInner>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for VehicleLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // remove_if holds the shard lock, so the count check and the removal
        // cannot interleave with a concurrent lock() on the same vehicle
        self.inner.locks.remove_if(&self.vehicle_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
