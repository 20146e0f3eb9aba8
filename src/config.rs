//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! The defaults carry the timing constants of the matching engine: a
//! 2-second matchmaker tick, 8/10-second no-match notice thresholds, a
//! 5-minute waiting timeout swept every 30 seconds and a 10-minute match
//! inactivity timeout swept every 60 seconds.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER__HOST, APP_MATCHING__TICK_SECONDS,
//!    ...; a double underscore separates the section from the field so that
//!    multi-word field names survive the mapping)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub matching: MatchingConfig,
    pub cleanup: CleanupConfig,
}

/// Server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Matchmaker timing and compatibility thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Period of the background matching pass, in seconds.
    pub tick_seconds: u64,

    /// Maximum allowed absolute age difference between partners.
    pub max_age_gap: u8,

    /// How long a participant waits before the first "no matches" notice.
    pub no_match_notice_seconds: u64,

    /// Minimum spacing between repeated "no matches" notices.
    pub no_match_repeat_seconds: u64,
}

/// Reaper periods and staleness thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Period of the waiting-pool sweep, in seconds.
    pub waiting_sweep_seconds: u64,

    /// Age after which a waiting entry is evicted.
    pub waiting_timeout_seconds: u64,

    /// Period of the match sweep, in seconds.
    pub match_sweep_seconds: u64,

    /// Age after which a match is ended for inactivity.
    pub match_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            matching: MatchingConfig {
                tick_seconds: 2,
                max_age_gap: 15,
                no_match_notice_seconds: 8,
                no_match_repeat_seconds: 10,
            },
            cleanup: CleanupConfig {
                waiting_sweep_seconds: 30,
                waiting_timeout_seconds: 5 * 60,
                match_sweep_seconds: 60,
                match_timeout_seconds: 10 * 60,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml and the environment,
    /// in that priority order. Environment keys use a double underscore
    /// between section and field (`APP_MATCHING__TICK_SECONDS`) so the
    /// underscores inside field names are left intact. `HOST` and `PORT`
    /// are honored without the `APP_` prefix because deployment platforms
    /// commonly set them.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Sanity-check the loaded values before the server starts.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.matching.tick_seconds == 0 {
            return Err(anyhow::anyhow!("Matching tick period must be greater than 0"));
        }

        if self.cleanup.waiting_sweep_seconds == 0 || self.cleanup.match_sweep_seconds == 0 {
            return Err(anyhow::anyhow!("Sweep periods must be greater than 0"));
        }

        if self.cleanup.waiting_timeout_seconds == 0 || self.cleanup.match_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Staleness timeouts must be greater than 0"));
        }

        if self.matching.no_match_repeat_seconds == 0 {
            return Err(anyhow::anyhow!(
                "No-match repeat threshold must be greater than 0"
            ));
        }

        Ok(())
    }

    /// Apply a partial update from a JSON document (the runtime config
    /// endpoint). Only fields present in the JSON are touched; the result
    /// is validated before it is accepted.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(matching) = partial.get("matching") {
            if let Some(v) = matching.get("tick_seconds").and_then(|v| v.as_u64()) {
                self.matching.tick_seconds = v;
            }
            if let Some(v) = matching.get("max_age_gap").and_then(|v| v.as_u64()) {
                self.matching.max_age_gap = v as u8;
            }
            if let Some(v) = matching.get("no_match_notice_seconds").and_then(|v| v.as_u64()) {
                self.matching.no_match_notice_seconds = v;
            }
            if let Some(v) = matching.get("no_match_repeat_seconds").and_then(|v| v.as_u64()) {
                self.matching.no_match_repeat_seconds = v;
            }
        }

        if let Some(cleanup) = partial.get("cleanup") {
            if let Some(v) = cleanup.get("waiting_sweep_seconds").and_then(|v| v.as_u64()) {
                self.cleanup.waiting_sweep_seconds = v;
            }
            if let Some(v) = cleanup.get("waiting_timeout_seconds").and_then(|v| v.as_u64()) {
                self.cleanup.waiting_timeout_seconds = v;
            }
            if let Some(v) = cleanup.get("match_sweep_seconds").and_then(|v| v.as_u64()) {
                self.cleanup.match_sweep_seconds = v;
            }
            if let Some(v) = cleanup.get("match_timeout_seconds").and_then(|v| v.as_u64()) {
                self.cleanup.match_timeout_seconds = v;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.matching.tick_seconds, 2);
        assert_eq!(config.matching.max_age_gap, 15);
        assert_eq!(config.cleanup.waiting_timeout_seconds, 300);
        assert_eq!(config.cleanup.match_timeout_seconds, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.matching.tick_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override_applies_to_nested_field() {
        env::set_var("APP_MATCHING__TICK_SECONDS", "9");
        let config = AppConfig::load().unwrap();
        env::remove_var("APP_MATCHING__TICK_SECONDS");

        assert_eq!(config.matching.tick_seconds, 9);
        // Fields without an override keep their defaults.
        assert_eq!(config.matching.max_age_gap, 15);
        assert_eq!(config.cleanup.match_sweep_seconds, 60);
    }

    #[test]
    fn test_partial_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"matching": {"max_age_gap": 10}, "server": {"port": 9090}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.matching.max_age_gap, 10);
        assert_eq!(config.server.port, 9090);
        // Untouched fields keep their values.
        assert_eq!(config.matching.tick_seconds, 2);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_update_rejects_invalid_result() {
        let mut config = AppConfig::default();
        let json = r#"{"matching": {"tick_seconds": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
