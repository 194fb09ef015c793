use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{PositionRecord, TrackingSession};

/// Reference record for a registered vehicle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Reference record for a mission a session can be attached to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// Read-only lookups against the fleet reference data.
#[async_trait]
pub trait Directory: Send + Sync + 'static {
    async fn vehicle(&self, vehicle_id: &str) -> Result<Option<VehicleRecord>>;
    async fn mission(&self, mission_id: &str) -> Result<Option<MissionRecord>>;
}

/// Durable store for sessions and their position trail.
///
/// Writes must land before the engine commits the matching in-memory state,
/// so implementations should fail fast. No cross-row transaction is assumed:
/// `save_session` upserts one session row, `append_position` appends one
/// breadcrumb row.
#[async_trait]
pub trait TrackStore: Send + Sync + 'static {
    async fn save_session(&self, session: &TrackingSession) -> Result<()>;
    async fn append_position(&self, record: &PositionRecord) -> Result<()>;
}
