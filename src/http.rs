//! REST query surface and the back-office stop command.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracking::TrackingSession;
use uuid::Uuid;

use crate::Engine;
use crate::error::HttpError;

type HttpResult<T> = Result<T, HttpError>;

#[axum::debug_handler]
pub async fn active_sessions(State(engine): State<Engine>) -> Json<Vec<TrackingSession>> {
    Json(engine.active_sessions())
}

#[axum::debug_handler]
pub async fn session(
    State(engine): State<Engine>, Path(session_id): Path<Uuid>,
) -> HttpResult<Json<TrackingSession>> {
    engine
        .session(session_id)
        .map(Json)
        .ok_or_else(|| HttpError::not_found(format!("no session {session_id}")))
}

#[axum::debug_handler]
pub async fn active_session_for_vehicle(
    State(engine): State<Engine>, Path(vehicle_id): Path<String>,
) -> HttpResult<Json<TrackingSession>> {
    engine
        .active_session_for(&vehicle_id)
        .map(Json)
        .ok_or_else(|| HttpError::not_found(format!("no active session for {vehicle_id}")))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[axum::debug_handler]
pub async fn session_history(
    State(engine): State<Engine>, Path(vehicle_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<TrackingSession>> {
    Json(engine.history(&vehicle_id, query.limit))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StopTrackingBody {
    pub reason: Option<String>,
}

/// `ForceStopVehicleTracking`: ends the vehicle's session and asks the
/// producing device to stop reporting. Idempotent; `stopped` is false when
/// no session was active.
#[axum::debug_handler]
pub async fn force_stop(
    State(engine): State<Engine>, Path(vehicle_id): Path<String>,
    body: Option<Json<StopTrackingBody>>,
) -> HttpResult<Json<Value>> {
    let reason = body.and_then(|Json(body)| body.reason);
    let stopped = engine.force_stop_vehicle(&vehicle_id, reason).await?;
    Ok(Json(json!({ "stopped": stopped })))
}
