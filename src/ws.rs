//! WebSocket gateway for producers and dashboard subscribers.
//!
//! One connection can play both roles: a vehicle app starts a session and
//! streams positions, a dashboard subscribes and receives fanned-out events.
//! The connection owns one registry subscriber; its bounded queue is drained
//! into outbound frames, inbound frames are dispatched to the engine. Closing
//! the socket tears down every scope and producer mapping the connection held.

use axum::extract::State;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tracking::model::{PositionReport, StartRequest, TrackingEvent, TrackingSession};
use tracking::{Error, SubscriberHandle};

use crate::Engine;

/// Inbound frames, a JSON object tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    StartSession(StartRequest),
    Position(PositionReport),
    /// Ends the session of the vehicle this connection last produced for.
    StopSession,
    #[serde(rename_all = "camelCase")]
    SubscribeToVehicle { vehicle_id: String },
    SubscribeToAllVehicles,
    #[serde(rename_all = "camelCase")]
    UnsubscribeFromVehicle { vehicle_id: String },
    UnsubscribeFromAllVehicles,
    GetActiveSessions,
}

/// Outbound frames: fanned-out events pass through as-is, queries and
/// failures get their own shapes.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    ActiveSessions { sessions: Vec<TrackingSession> },
    #[serde(rename_all = "camelCase")]
    Error { code: String, description: String },
}

pub async fn upgrade(ws: WebSocketUpgrade, State(engine): State<Engine>) -> Response {
    ws.on_upgrade(move |socket| connection(socket, engine))
}

async fn connection(mut socket: WebSocket, engine: Engine) {
    let handle = engine.register_subscriber();
    debug!(subscriber_id = %handle.id(), "connection opened");

    // the vehicle this connection produces for, for the bare StopSession
    let mut producing_for: Option<String> = None;

    loop {
        tokio::select! {
            event = handle.recv() => {
                let Some(event) = event else { break };
                if send_json(&mut socket, &event).await.is_err() {
                    break;
                }
            }

            frame = socket.recv() => {
                let Some(Ok(frame)) = frame else { break };
                match frame {
                    Message::Text(text) => {
                        if handle_frame(&mut socket, &engine, &handle, &mut producing_for, &text)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    // axum answers pings itself; ignore the rest
                    _ => {}
                }
            }
        }
    }

    engine.disconnect(handle.id());
    debug!(subscriber_id = %handle.id(), "connection closed");
}

/// Dispatch one inbound frame. `Err` means the socket is gone.
async fn handle_frame(
    socket: &mut WebSocket, engine: &Engine, handle: &SubscriberHandle,
    producing_for: &mut Option<String>, text: &Utf8Bytes,
) -> Result<(), axum::Error> {
    let message: ClientMessage = match serde_json::from_str(text.as_str()) {
        Ok(message) => message,
        Err(err) => {
            debug!(subscriber_id = %handle.id(), error = %err, "unparseable frame");
            return send_error(
                socket,
                &Error::InvalidFormat(format!("unparseable message: {err}")),
            )
            .await;
        }
    };

    match message {
        ClientMessage::StartSession(request) => {
            let vehicle_id = request.vehicle_id.clone();
            match engine.start_session(request, Some(handle.id())).await {
                Ok(session) => {
                    *producing_for = Some(vehicle_id);
                    send_json(socket, &TrackingEvent::SessionStarted { session }).await?;
                }
                Err(err) => send_error(socket, &err).await?,
            }
        }
        ClientMessage::Position(report) => {
            *producing_for = Some(report.vehicle_id.clone());
            // dropped reports are deliberately not surfaced to the producer
            if let Err(err) = engine.submit_position(report, Some(handle.id())).await {
                send_error(socket, &err).await?;
            }
        }
        ClientMessage::StopSession => {
            let Some(vehicle_id) = producing_for.as_deref() else {
                return send_error(
                    socket,
                    &Error::InvalidFormat("connection has no session to stop".to_string()),
                )
                .await;
            };
            match engine.stop_vehicle(vehicle_id).await {
                // soft no-op either way; subscribers got SessionStopped
                Ok(_) => {}
                Err(err) => send_error(socket, &err).await?,
            }
        }
        ClientMessage::SubscribeToVehicle { vehicle_id } => {
            engine.subscribe(handle.id(), &vehicle_id);
        }
        ClientMessage::SubscribeToAllVehicles => engine.subscribe_all(handle.id()),
        ClientMessage::UnsubscribeFromVehicle { vehicle_id } => {
            engine.unsubscribe(handle.id(), &vehicle_id);
        }
        ClientMessage::UnsubscribeFromAllVehicles => engine.unsubscribe_all(handle.id()),
        ClientMessage::GetActiveSessions => {
            let reply = ServerMessage::ActiveSessions { sessions: engine.active_sessions() };
            send_json(socket, &reply).await?;
        }
    }

    Ok(())
}

async fn send_error(socket: &mut WebSocket, err: &Error) -> Result<(), axum::Error> {
    let reply = ServerMessage::Error {
        code: err.code().to_string(),
        description: err.description(),
    };
    send_json(socket, &reply).await
}

async fn send_json(
    socket: &mut WebSocket, payload: &impl Serialize,
) -> Result<(), axum::Error> {
    match serde_json::to_string(payload) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound frame");
            Ok(())
        }
    }
}
