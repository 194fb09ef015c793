use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Live tracking session for a single vehicle.
///
/// Aggregates everything a dashboard needs to render the vehicle: who is
/// driving, the last reported fix, and the running totals for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSession {
    pub session_id: Uuid,
    pub vehicle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    pub driver_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_position_at: Option<DateTime<Utc>>,
    pub positions_count: u64,
    pub total_distance_meters: f64,
}

impl TrackingSession {
    /// The last accepted fix, when the session has reported at least once.
    #[must_use]
    pub fn last_point(&self) -> Option<(f64, f64)> {
        match (self.last_latitude, self.last_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// When the vehicle was last heard from: the last accepted position,
    /// falling back to the session start for sessions that never reported.
    #[must_use]
    pub fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_position_at.unwrap_or(self.started_at)
    }
}

/// Append-only breadcrumb row for one accepted position report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub record_id: Uuid,
    pub session_id: Uuid,
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}
