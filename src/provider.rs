//! In-memory implementations of the engine's collaborator ports.
//!
//! The directory is seeded from the environment; the track store keeps the
//! durable trail in process memory. Both are stand-ins a deployment replaces
//! with real backends behind the same traits.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracking::model::{PositionRecord, TrackingSession};
use tracking::provider::{Directory, MissionRecord, TrackStore, VehicleRecord};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    vehicles: DashMap<String, VehicleRecord>,
    missions: DashMap<String, MissionRecord>,
}

impl MemoryDirectory {
    /// Directory seeded from `FLEET_VEHICLES` (`id=plate` comma list).
    pub fn from_env() -> Self {
        Self::seeded_from(&crate::config::fleet_vehicles())
    }

    fn seeded_from(entries: &str) -> Self {
        let directory = Self::default();
        for entry in entries.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (id, plate) = entry.split_once('=').unwrap_or((entry, ""));
            directory.add_vehicle(VehicleRecord {
                id: id.to_string(),
                plate: (!plate.is_empty()).then(|| plate.to_string()),
                ..VehicleRecord::default()
            });
        }
        directory
    }

    pub fn add_vehicle(&self, vehicle: VehicleRecord) {
        self.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    pub fn add_mission(&self, mission: MissionRecord) {
        self.missions.insert(mission.id.clone(), mission);
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn vehicle(&self, vehicle_id: &str) -> Result<Option<VehicleRecord>> {
        Ok(self.vehicles.get(vehicle_id).map(|entry| entry.clone()))
    }

    async fn mission(&self, mission_id: &str) -> Result<Option<MissionRecord>> {
        Ok(self.missions.get(mission_id).map(|entry| entry.clone()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    sessions: DashMap<Uuid, TrackingSession>,
    positions: Mutex<Vec<PositionRecord>>,
}

#[async_trait]
impl TrackStore for MemoryTrackStore {
    async fn save_session(&self, session: &TrackingSession) -> Result<()> {
        self.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn append_position(&self, record: &PositionRecord) -> Result<()> {
        let mut positions = self.positions.lock().await;
        positions.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn seeds_vehicles_from_entry_list() {
        let directory = MemoryDirectory::seeded_from("v-9=ABC123, v-10 ,");

        let vehicle = directory.vehicle("v-9").await.unwrap().expect("seeded");
        assert_eq!(vehicle.plate.as_deref(), Some("ABC123"));
        assert!(directory.vehicle("v-10").await.unwrap().unwrap().plate.is_none());
        assert!(directory.vehicle("ghost").await.unwrap().is_none());
    }
}
