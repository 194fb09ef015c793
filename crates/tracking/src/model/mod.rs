pub mod events;
pub mod session;

pub use events::{DisplayData, EventKind, PositionReport, StartRequest, TrackingEvent};
pub use session::{PositionRecord, TrackingSession};
