//! Fleet live tracking service.
//!
//! Hosts the tracking engine behind a WebSocket gateway for vehicle apps and
//! dashboards plus a small REST surface for queries and back-office stop
//! commands. Reference data and the durable trail live in the in-memory
//! providers; swap those for real backends without touching the engine.

mod config;
mod error;
mod http;
mod provider;
mod ws;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use tracking::TrackingEngine;

use crate::provider::{MemoryDirectory, MemoryTrackStore};

const SERVICE: &str = "fleetlive";

/// Engine wired to the service's providers, shared as router state.
pub type Engine = TrackingEngine<MemoryDirectory, MemoryTrackStore>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = tracking::Config::from_env();
    let engine = Engine::new(config, MemoryDirectory::from_env(), MemoryTrackStore::default());
    let reaper = tracking::reaper::spawn(engine.clone());

    let router = Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/sessions/active", get(http::active_sessions))
        .route("/sessions/{session_id}", get(http::session))
        .route("/vehicles/{vehicle_id}/session", get(http::active_session_for_vehicle))
        .route("/vehicles/{vehicle_id}/sessions", get(http::session_history))
        .route("/vehicles/{vehicle_id}/stop-tracking", post(http::force_stop))
        .with_state(engine);

    let addr = config::bind_addr();
    let listener =
        tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, service = %SERVICE, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    reaper.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
}
