//! Live tracking session engine.
//!
//! Turns raw position reports from vehicle apps into tracking sessions with
//! running distance and position totals, fans session events out to
//! subscribed dashboards, and relays stop commands back to the producing
//! device. State lives in memory and is written through to a durable store;
//! vehicle and mission reference data comes from a directory. Both
//! collaborators sit behind traits in [`provider`].

pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod locks;
pub mod model;
pub mod provider;
pub mod reaper;
pub mod registry;
pub mod relay;
pub mod store;

pub use config::Config;
pub use engine::{IngestOutcome, TrackingEngine};
pub use error::{Error, Result};
pub use model::{
    DisplayData, EventKind, PositionRecord, PositionReport, StartRequest, TrackingEvent,
    TrackingSession,
};
pub use provider::{Directory, MissionRecord, TrackStore, VehicleRecord};
pub use reaper::ReaperHandle;
pub use registry::{SubscriberHandle, SubscriberId, SubscriptionRegistry};
