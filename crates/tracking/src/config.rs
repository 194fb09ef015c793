use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Sessions with no accepted position for longer than this are reaped.
    pub session_timeout: Duration,
    /// How often the stale session sweep runs.
    pub reaper_interval: StdDuration,
    /// Bounded event queue depth per subscriber connection.
    pub subscriber_queue_capacity: usize,
    /// Upper bound on the per-vehicle history page size.
    pub history_limit_max: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let session_timeout = Duration::seconds(env_i64("SESSION_TIMEOUT_SECS", 60));
        let reaper_interval = StdDuration::from_secs(env_u64("REAPER_INTERVAL_SECS", 30));
        let subscriber_queue_capacity = env_usize("SUBSCRIBER_QUEUE_CAPACITY", 64);
        let history_limit_max = env_usize("HISTORY_LIMIT_MAX", 100);

        Self { session_timeout, reaper_interval, subscriber_queue_capacity, history_limit_max }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|value| value.parse::<i64>().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|value| value.parse::<u64>().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|value| value.parse::<usize>().ok()).unwrap_or(default)
}
