use std::env;
use std::time::Duration;

use crate::replay::ReplayTiming;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Event bridge poll interval.
    pub poll_interval_ms: u64,
    /// Upper bound on one replay step's dispatch.
    pub step_timeout_ms: u64,
    /// Pacing delay between replay steps.
    pub step_pacing_ms: u64,
    /// Settle delay after a replayed navigation.
    pub navigation_settle_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("AUTOBROWSER_PORT", 8765),
            host: env::var("AUTOBROWSER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            poll_interval_ms: env_parsed("AUTOBROWSER_POLL_INTERVAL_MS", 250),
            step_timeout_ms: env_parsed("AUTOBROWSER_STEP_TIMEOUT_MS", 15_000),
            step_pacing_ms: env_parsed("AUTOBROWSER_STEP_PACING_MS", 400),
            navigation_settle_ms: env_parsed("AUTOBROWSER_NAV_SETTLE_MS", 1_000),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn replay_timing(&self) -> ReplayTiming {
        ReplayTiming {
            step_timeout: Duration::from_millis(self.step_timeout_ms),
            pacing: Duration::from_millis(self.step_pacing_ms),
            navigation_settle: Duration::from_millis(self.navigation_settle_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8765,
            host: "127.0.0.1".to_string(),
            poll_interval_ms: 250,
            step_timeout_ms: 15_000,
            step_pacing_ms: 400,
            navigation_settle_ms: 1_000,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
