//! Server configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::auto_assign::{AutoAssignSettings, DEFAULT_INTERVAL_SECS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory for JSON snapshots. `None` keeps sessions in memory only.
    pub data_dir: Option<PathBuf>,
    /// Initial auto-assign settings for new sessions.
    pub auto_assign: AutoAssignSettings,
    pub suggestion_endpoint: Option<String>,
    pub suggestion_api_key: Option<String>,
    pub suggestion_timeout: Duration,
    /// Sessions not touched for this long are dropped from memory.
    pub inactivity_timeout: Duration,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_suggestion_timeout_secs() -> u64 {
    20
}

fn default_inactivity_hours() -> u64 {
    12
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = non_empty(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: None,
            auto_assign: AutoAssignSettings::default(),
            suggestion_endpoint: None,
            suggestion_api_key: None,
            suggestion_timeout: Duration::from_secs(default_suggestion_timeout_secs()),
            inactivity_timeout: Duration::from_secs(default_inactivity_hours() * 3600),
        }
    }
}

impl Config {
    /// HOST, PORT, DATA_DIR, AUTO_ASSIGN_ENABLED, AUTO_ASSIGN_INTERVAL_SECS,
    /// SUGGESTION_ENDPOINT, SUGGESTION_API_KEY, SUGGESTION_TIMEOUT_SECS,
    /// SESSION_INACTIVITY_HOURS. Missing or invalid values fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: non_empty("HOST").unwrap_or_else(default_host),
            port: parsed("PORT").unwrap_or_else(default_port),
            data_dir: non_empty("DATA_DIR").map(PathBuf::from),
            auto_assign: AutoAssignSettings {
                enabled: parsed("AUTO_ASSIGN_ENABLED").unwrap_or(false),
                interval_secs: parsed("AUTO_ASSIGN_INTERVAL_SECS").unwrap_or(DEFAULT_INTERVAL_SECS),
            },
            suggestion_endpoint: non_empty("SUGGESTION_ENDPOINT"),
            suggestion_api_key: non_empty("SUGGESTION_API_KEY"),
            suggestion_timeout: Duration::from_secs(
                parsed("SUGGESTION_TIMEOUT_SECS").unwrap_or_else(default_suggestion_timeout_secs),
            ),
            inactivity_timeout: Duration::from_secs(
                parsed("SESSION_INACTIVITY_HOURS").unwrap_or_else(default_inactivity_hours) * 3600,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.port, 8080);
        assert_eq!(c.host, "0.0.0.0");
        assert!(!c.auto_assign.enabled);
        assert_eq!(c.auto_assign.interval_secs, 30);
        assert_eq!(c.inactivity_timeout, Duration::from_secs(12 * 3600));
    }
}
