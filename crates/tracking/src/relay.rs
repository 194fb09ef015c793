use dashmap::DashMap;

use crate::registry::SubscriberId;

/// Maps each vehicle to the connection currently producing its positions.
///
/// Updated on session start and on every accepted report, so the latest
/// writer wins when a vehicle changes devices. Stop commands are addressed
/// through this map.
#[derive(Debug, Default)]
pub struct CommandRelay {
    producers: DashMap<String, SubscriberId>,
}

impl CommandRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_producer(&self, vehicle_id: &str, subscriber_id: SubscriberId) {
        self.producers.insert(vehicle_id.to_string(), subscriber_id);
    }

    #[must_use]
    pub fn producer_for(&self, vehicle_id: &str) -> Option<SubscriberId> {
        self.producers.get(vehicle_id).map(|entry| *entry.value())
    }

    /// Drop every mapping held by a closed connection.
    pub fn clear_connection(&self, subscriber_id: SubscriberId) {
        self.producers.retain(|_, producer| *producer != subscriber_id);
    }
}
