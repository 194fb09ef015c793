//! Service-level settings. Engine settings live in `tracking::config`.

pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        let default = "0.0.0.0:8080".to_string();
        tracing::trace!("BIND_ADDR not set, using default: {default}");
        default
    })
}

/// Comma-separated `vehicle_id=plate` entries seeding the directory.
pub fn fleet_vehicles() -> String {
    std::env::var("FLEET_VEHICLES").unwrap_or_else(|_| {
        let default = "v-1=KJF102,v-2=LMR543,v-3=PQT981".to_string();
        tracing::trace!("FLEET_VEHICLES not set, using default: {default}");
        default
    })
}
