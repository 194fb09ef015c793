use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::locks::VehicleLocks;
use crate::model::{PositionReport, StartRequest, TrackingEvent, TrackingSession};
use crate::provider::{Directory, TrackStore};
use crate::registry::{SubscriberHandle, SubscriberId, SubscriptionRegistry};
use crate::relay::CommandRelay;
use crate::store::SessionStore;

/// What happened to a submitted position report.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Folded into the vehicle's active session.
    Applied(TrackingSession),
    /// No active session for the vehicle; silently dropped.
    Dropped,
}

/// The tracking engine: session lifecycle, position ingestion, event fan-out
/// and stop command relay for a fleet of vehicles.
///
/// All mutation for one vehicle runs inside that vehicle's critical section,
/// covering the store write and the event publication together, so events
/// reach subscribers in the same order the state changed. Cheap to clone.
pub struct TrackingEngine<D, S> {
    inner: Arc<EngineInner<D, S>>,
}

struct EngineInner<D, S> {
    config: Config,
    directory: D,
    sessions: SessionStore<S>,
    registry: SubscriptionRegistry,
    relay: CommandRelay,
    locks: VehicleLocks,
}

impl<D, S> Clone for TrackingEngine<D, S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<D: Directory, S: TrackStore> TrackingEngine<D, S> {
    #[must_use]
    pub fn new(config: Config, directory: D, store: S) -> Self {
        let registry = SubscriptionRegistry::new(config.subscriber_queue_capacity);
        Self {
            inner: Arc::new(EngineInner {
                config,
                directory,
                sessions: SessionStore::new(store),
                registry,
                relay: CommandRelay::new(),
                locks: VehicleLocks::new(),
            }),
        }
    }

    /// Start tracking a vehicle, displacing any session still active for it.
    ///
    /// Publishes `SessionStopped` for the displaced session, then
    /// `SessionStarted` for the new one. When `producer` is given the
    /// connection becomes the stop command target for the vehicle.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidFormat`] for an empty vehicle id or driver name,
    /// [`Error::UnknownVehicle`] when the directory has no such vehicle,
    /// [`Error::Directory`] when the lookup fails, and
    /// [`Error::Persistence`] when the durable write fails.
    pub async fn start_session(
        &self, request: StartRequest, producer: Option<SubscriberId>,
    ) -> Result<TrackingSession> {
        if request.vehicle_id.trim().is_empty() {
            return Err(Error::InvalidFormat("vehicleId must not be empty".to_string()));
        }
        if request.driver_name.trim().is_empty() {
            return Err(Error::InvalidFormat("driverName must not be empty".to_string()));
        }

        let vehicle = self
            .inner
            .directory
            .vehicle(&request.vehicle_id)
            .await
            .map_err(|err| {
                Error::Directory(format!("fetching vehicle {}: {err}", request.vehicle_id))
            })?;
        if vehicle.is_none() {
            return Err(Error::UnknownVehicle(format!(
                "vehicle {} is not registered",
                request.vehicle_id
            )));
        }

        if let Some(mission_id) = &request.mission_id {
            // best effort: a missing mission never blocks the driver
            match self.inner.directory.mission(mission_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(
                        vehicle_id = %request.vehicle_id,
                        mission_id = %mission_id,
                        "session references an unknown mission"
                    );
                }
                Err(err) => {
                    warn!(mission_id = %mission_id, error = %err, "mission lookup failed");
                }
            }
        }

        let guard = self.inner.locks.lock(request.vehicle_id.clone()).await;
        let outcome = self.inner.sessions.start(&request, Utc::now()).await?;

        if let Some(displaced) = &outcome.displaced {
            info!(
                vehicle_id = %displaced.vehicle_id,
                session_id = %displaced.session_id,
                "displaced still-active session on restart"
            );
            self.inner
                .registry
                .publish(&TrackingEvent::SessionStopped {
                    session_id: displaced.session_id,
                    vehicle_id: displaced.vehicle_id.clone(),
                })
                .await;
        }
        self.inner
            .registry
            .publish(&TrackingEvent::SessionStarted { session: outcome.session.clone() })
            .await;
        drop(guard);

        if let Some(producer) = producer {
            self.inner.relay.track_producer(&outcome.session.vehicle_id, producer);
        }

        info!(
            vehicle_id = %outcome.session.vehicle_id,
            session_id = %outcome.session.session_id,
            driver_name = %outcome.session.driver_name,
            "tracking session started"
        );
        Ok(outcome.session)
    }

    /// Fold a position report into the vehicle's active session.
    ///
    /// Reports for vehicles without an active session are dropped without
    /// an error. Accepted reports publish `PositionUpdate` followed by
    /// `SessionUpdated` and refresh the producer mapping.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when the durable write fails; the in-memory
    /// session is left unchanged and no events are published.
    pub async fn submit_position(
        &self, report: PositionReport, producer: Option<SubscriberId>,
    ) -> Result<IngestOutcome> {
        let guard = self.inner.locks.lock(report.vehicle_id.clone()).await;
        let Some((session, _record)) = self.inner.sessions.apply(&report, Utc::now()).await? else {
            drop(guard);
            debug!(vehicle_id = %report.vehicle_id, "dropped report without active session");
            return Ok(IngestOutcome::Dropped);
        };

        self.inner
            .registry
            .publish(&TrackingEvent::PositionUpdate {
                vehicle_id: report.vehicle_id.clone(),
                session_id: session.session_id,
                latitude: report.latitude,
                longitude: report.longitude,
                speed: report.speed,
                heading: report.heading,
                recorded_at: report.recorded_at,
                display: report.display.clone(),
            })
            .await;
        self.inner
            .registry
            .publish(&TrackingEvent::SessionUpdated { session: session.clone() })
            .await;
        drop(guard);

        if let Some(producer) = producer {
            self.inner.relay.track_producer(&report.vehicle_id, producer);
        }

        Ok(IngestOutcome::Applied(session))
    }

    /// End a session by id. Returns false when the id is unknown or the
    /// session already ended, so repeated stops are harmless.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when the durable write fails.
    pub async fn stop_session(&self, session_id: Uuid) -> Result<bool> {
        let Some(session) = self.inner.sessions.session(session_id) else {
            return Ok(false);
        };

        let guard = self.inner.locks.lock(session.vehicle_id.clone()).await;
        let stopped = self.inner.sessions.stop_by_id(session_id, Utc::now()).await?;
        if let Some(ended) = &stopped {
            self.publish_stopped(ended).await;
        }
        drop(guard);

        Ok(stopped.is_some())
    }

    /// End the vehicle's active session, if any.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when the durable write fails.
    pub async fn stop_vehicle(&self, vehicle_id: &str) -> Result<bool> {
        let guard = self.inner.locks.lock(vehicle_id).await;
        let stopped = self.inner.sessions.stop_for_vehicle(vehicle_id, Utc::now()).await?;
        if let Some(ended) = &stopped {
            self.publish_stopped(ended).await;
        }
        drop(guard);

        Ok(stopped.is_some())
    }

    /// Back-office stop: end the session and ask the producing device to
    /// stop reporting. `SessionStopped` goes to every subscriber of the
    /// vehicle; `StopTrackingRequested` only to the producer connection.
    /// A vehicle with no active session is left alone.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when the durable write fails.
    pub async fn force_stop_vehicle(
        &self, vehicle_id: &str, reason: Option<String>,
    ) -> Result<bool> {
        let guard = self.inner.locks.lock(vehicle_id).await;
        let stopped = self.inner.sessions.stop_for_vehicle(vehicle_id, Utc::now()).await?;
        let Some(ended) = stopped else {
            drop(guard);
            return Ok(false);
        };

        self.publish_stopped(&ended).await;
        drop(guard);

        match self.inner.relay.producer_for(vehicle_id) {
            Some(producer) => {
                let delivered = self
                    .inner
                    .registry
                    .send_to(
                        producer,
                        TrackingEvent::StopTrackingRequested {
                            vehicle_id: vehicle_id.to_string(),
                            reason,
                        },
                    )
                    .await;
                if !delivered {
                    debug!(vehicle_id = vehicle_id, "producer connection already gone");
                }
            }
            None => {
                debug!(vehicle_id = vehicle_id, "no producer connection for stop command");
            }
        }

        info!(
            vehicle_id = vehicle_id,
            session_id = %ended.session_id,
            "tracking force-stopped"
        );
        Ok(true)
    }

    /// End every active session silent for longer than the configured
    /// timeout. Each vehicle is swept inside its own critical section, so a
    /// report racing the sweep either refreshes the session first or lands
    /// after it ended and is dropped. Returns the reaped session ids.
    pub async fn reap_stale(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let cutoff = now - self.inner.config.session_timeout;
        let mut reaped = Vec::new();

        for vehicle_id in self.inner.sessions.active_vehicle_ids() {
            let guard = self.inner.locks.lock(vehicle_id.clone()).await;
            let Some(session) = self.inner.sessions.active_for_vehicle(&vehicle_id) else {
                continue;
            };
            if session.last_seen_at() >= cutoff {
                continue;
            }

            match self.inner.sessions.stop_by_id(session.session_id, now).await {
                Ok(Some(ended)) => {
                    info!(
                        vehicle_id = %ended.vehicle_id,
                        session_id = %ended.session_id,
                        last_seen_at = %session.last_seen_at(),
                        "reaped stale session"
                    );
                    self.publish_stopped(&ended).await;
                    reaped.push(ended.session_id);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(vehicle_id = %vehicle_id, error = %err, "failed to reap stale session");
                }
            }
            drop(guard);
        }

        reaped
    }

    #[must_use]
    pub fn session(&self, session_id: Uuid) -> Option<TrackingSession> {
        self.inner.sessions.session(session_id)
    }

    #[must_use]
    pub fn active_session_for(&self, vehicle_id: &str) -> Option<TrackingSession> {
        self.inner.sessions.active_for_vehicle(vehicle_id)
    }

    #[must_use]
    pub fn active_sessions(&self) -> Vec<TrackingSession> {
        self.inner.sessions.active_sessions()
    }

    /// Session history for a vehicle, newest first. The page size is capped
    /// by configuration.
    #[must_use]
    pub fn history(&self, vehicle_id: &str, limit: Option<usize>) -> Vec<TrackingSession> {
        let max = self.inner.config.history_limit_max;
        let limit = limit.map_or(max, |requested| requested.min(max));
        self.inner.sessions.history_for_vehicle(vehicle_id, limit)
    }

    #[must_use]
    pub fn register_subscriber(&self) -> SubscriberHandle {
        self.inner.registry.register()
    }

    pub fn subscribe(&self, subscriber_id: SubscriberId, vehicle_id: &str) {
        self.inner.registry.subscribe(subscriber_id, vehicle_id);
    }

    pub fn subscribe_all(&self, subscriber_id: SubscriberId) {
        self.inner.registry.subscribe_all(subscriber_id);
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId, vehicle_id: &str) {
        self.inner.registry.unsubscribe(subscriber_id, vehicle_id);
    }

    pub fn unsubscribe_all(&self, subscriber_id: SubscriberId) {
        self.inner.registry.unsubscribe_all(subscriber_id);
    }

    /// Tear down a closed connection: scopes, queue and producer mappings.
    pub fn disconnect(&self, subscriber_id: SubscriberId) {
        self.inner.registry.disconnect(subscriber_id);
        self.inner.relay.clear_connection(subscriber_id);
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    async fn publish_stopped(&self, ended: &TrackingSession) {
        self.inner
            .registry
            .publish(&TrackingEvent::SessionStopped {
                session_id: ended.session_id,
                vehicle_id: ended.vehicle_id.clone(),
            })
            .await;
    }
}
