use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::TrackingSession;

/// Display fields supplied by the producer alongside each report.
///
/// Free text trusted as-is; the engine never resolves it against the
/// directory, it only forwards it to subscribers for rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_phone: Option<String>,
}

/// Raw position report from a vehicle app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
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
    #[serde(default)]
    pub display: DisplayData,
}

/// Request to begin tracking a vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub vehicle_id: String,
    pub driver_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
}

/// Event fanned out to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackingEvent {
    /// Accepted position, forwarded with the producer's display fields.
    #[serde(rename_all = "camelCase")]
    PositionUpdate {
        vehicle_id: String,
        session_id: Uuid,
        latitude: f64,
        longitude: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heading: Option<f64>,
        recorded_at: DateTime<Utc>,
        #[serde(default)]
        display: DisplayData,
    },

    /// A session started for the vehicle.
    #[serde(rename_all = "camelCase")]
    SessionStarted { session: TrackingSession },

    /// Session aggregate changed (new totals after an accepted position).
    #[serde(rename_all = "camelCase")]
    SessionUpdated { session: TrackingSession },

    /// The session ended, whatever the cause.
    #[serde(rename_all = "camelCase")]
    SessionStopped { session_id: Uuid, vehicle_id: String },

    /// Back-office asked the producing device to stop reporting.
    #[serde(rename_all = "camelCase")]
    StopTrackingRequested {
        vehicle_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl TrackingEvent {
    /// The vehicle this event concerns.
    #[must_use]
    pub fn vehicle_id(&self) -> &str {
        match self {
            Self::PositionUpdate { vehicle_id, .. }
            | Self::SessionStopped { vehicle_id, .. }
            | Self::StopTrackingRequested { vehicle_id, .. } => vehicle_id,
            Self::SessionStarted { session } | Self::SessionUpdated { session } => {
                &session.vehicle_id
            }
        }
    }

    /// The event kind, used by queue replacement on overflow.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PositionUpdate { .. } => EventKind::PositionUpdate,
            Self::SessionStarted { .. } => EventKind::SessionStarted,
            Self::SessionUpdated { .. } => EventKind::SessionUpdated,
            Self::SessionStopped { .. } => EventKind::SessionStopped,
            Self::StopTrackingRequested { .. } => EventKind::StopTrackingRequested,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PositionUpdate,
    SessionStarted,
    SessionUpdated,
    SessionStopped,
    StopTrackingRequested,
}
