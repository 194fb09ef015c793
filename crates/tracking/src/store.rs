use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::distance::haversine_meters;
use crate::error::{Error, Result};
use crate::model::{PositionRecord, PositionReport, StartRequest, TrackingSession};
use crate::provider::TrackStore;

/// Authoritative in-memory session state, persisted through a [`TrackStore`].
///
/// Every mutation writes the durable rows first and only then commits to the
/// in-memory maps, so a failed write leaves the live state exactly as it was.
/// Callers serialize mutations per vehicle; the store itself only guarantees
/// the consistency of each individual map operation.
#[derive(Debug)]
pub struct SessionStore<S> {
    store: S,
    sessions: DashMap<Uuid, TrackingSession>,
    active: DashMap<String, Uuid>,
}

/// Result of starting a session: the new session, plus the previously
/// active one for the vehicle when the start displaced it.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub session: TrackingSession,
    pub displaced: Option<TrackingSession>,
}

impl<S: TrackStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store, sessions: DashMap::new(), active: DashMap::new() }
    }

    /// Start a session for the vehicle, displacing any session still active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] when the durable write fails; neither
    /// the displaced session nor the new one is committed in that case.
    pub async fn start(&self, request: &StartRequest, now: DateTime<Utc>) -> Result<StartOutcome> {
        let displaced = match self.active_for_vehicle(&request.vehicle_id) {
            Some(prior) => {
                let mut ended = prior;
                ended.ended_at = Some(now);
                ended.is_active = false;
                self.store.save_session(&ended).await.map_err(|err| {
                    Error::Persistence(format!("ending session {}: {err}", ended.session_id))
                })?;
                Some(ended)
            }
            None => None,
        };

        let session = TrackingSession {
            session_id: Uuid::new_v4(),
            vehicle_id: request.vehicle_id.clone(),
            driver_id: request.driver_id.clone(),
            driver_name: request.driver_name.clone(),
            driver_phone: request.driver_phone.clone(),
            mission_id: request.mission_id.clone(),
            started_at: now,
            ended_at: None,
            is_active: true,
            last_latitude: None,
            last_longitude: None,
            last_speed: None,
            last_heading: None,
            last_position_at: None,
            positions_count: 0,
            total_distance_meters: 0.0,
        };
        self.store.save_session(&session).await.map_err(|err| {
            Error::Persistence(format!("saving session {}: {err}", session.session_id))
        })?;

        // both rows are durable, commit
        if let Some(ended) = &displaced {
            self.sessions.insert(ended.session_id, ended.clone());
        }
        self.sessions.insert(session.session_id, session.clone());
        self.active.insert(session.vehicle_id.clone(), session.session_id);

        Ok(StartOutcome { session, displaced })
    }

    /// Fold an accepted position into the vehicle's active session.
    ///
    /// Returns `Ok(None)` when the vehicle has no active session; the report
    /// is dropped without records or state changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] when a durable write fails; the
    /// in-memory session keeps its previous totals.
    pub async fn apply(
        &self, report: &PositionReport, now: DateTime<Utc>,
    ) -> Result<Option<(TrackingSession, PositionRecord)>> {
        let Some(mut session) = self.active_for_vehicle(&report.vehicle_id) else {
            return Ok(None);
        };

        let increment = session
            .last_point()
            .map_or(0.0, |(lat, lon)| {
                haversine_meters(lat, lon, report.latitude, report.longitude)
            });

        session.positions_count += 1;
        session.total_distance_meters += increment;
        session.last_latitude = Some(report.latitude);
        session.last_longitude = Some(report.longitude);
        session.last_speed = report.speed;
        session.last_heading = report.heading;
        session.last_position_at = Some(now);

        let record = PositionRecord {
            record_id: Uuid::new_v4(),
            session_id: session.session_id,
            vehicle_id: report.vehicle_id.clone(),
            latitude: report.latitude,
            longitude: report.longitude,
            altitude: report.altitude,
            speed: report.speed,
            heading: report.heading,
            accuracy: report.accuracy,
            recorded_at: report.recorded_at,
        };

        self.store.append_position(&record).await.map_err(|err| {
            Error::Persistence(format!("appending position for {}: {err}", report.vehicle_id))
        })?;
        self.store.save_session(&session).await.map_err(|err| {
            Error::Persistence(format!("saving session {}: {err}", session.session_id))
        })?;

        self.sessions.insert(session.session_id, session.clone());

        Ok(Some((session, record)))
    }

    /// End the session if it is still active. `Ok(None)` when the id is
    /// unknown or the session already ended, making repeated stops no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] when the durable write fails.
    pub async fn stop_by_id(
        &self, session_id: Uuid, now: DateTime<Utc>,
    ) -> Result<Option<TrackingSession>> {
        let Some(session) = self.session(session_id) else {
            return Ok(None);
        };
        if !session.is_active {
            return Ok(None);
        }

        let mut ended = session;
        ended.ended_at = Some(now);
        ended.is_active = false;
        self.store.save_session(&ended).await.map_err(|err| {
            Error::Persistence(format!("ending session {}: {err}", ended.session_id))
        })?;

        self.sessions.insert(ended.session_id, ended.clone());
        self.active.remove_if(&ended.vehicle_id, |_, active_id| *active_id == session_id);

        Ok(Some(ended))
    }

    /// End the vehicle's active session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] when the durable write fails.
    pub async fn stop_for_vehicle(
        &self, vehicle_id: &str, now: DateTime<Utc>,
    ) -> Result<Option<TrackingSession>> {
        match self.active.get(vehicle_id).map(|id| *id) {
            Some(session_id) => self.stop_by_id(session_id, now).await,
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn session(&self, session_id: Uuid) -> Option<TrackingSession> {
        self.sessions.get(&session_id).map(|session| session.clone())
    }

    #[must_use]
    pub fn active_for_vehicle(&self, vehicle_id: &str) -> Option<TrackingSession> {
        let session_id = self.active.get(vehicle_id).map(|id| *id)?;
        self.sessions.get(&session_id).map(|session| session.clone())
    }

    /// All active sessions, most recently heard from first.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<TrackingSession> {
        let mut sessions: Vec<TrackingSession> = self
            .active
            .iter()
            .filter_map(|entry| self.sessions.get(entry.value()).map(|session| session.clone()))
            .collect();
        sessions.sort_by(|a, b| b.last_seen_at().cmp(&a.last_seen_at()));
        sessions
    }

    /// Sessions for the vehicle, newest first, at most `limit` entries.
    #[must_use]
    pub fn history_for_vehicle(&self, vehicle_id: &str, limit: usize) -> Vec<TrackingSession> {
        let mut sessions: Vec<TrackingSession> = self
            .sessions
            .iter()
            .filter(|entry| entry.vehicle_id == vehicle_id)
            .map(|entry| entry.clone())
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        sessions
    }

    /// Vehicles with an active session, for the stale sweep.
    #[must_use]
    pub fn active_vehicle_ids(&self) -> Vec<String> {
        self.active.iter().map(|entry| entry.key().clone()).collect()
    }
}
