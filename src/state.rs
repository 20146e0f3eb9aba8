//! # Application State Management
//!
//! Shared state injected into every HTTP request handler and the WebSocket
//! actors.
//!
//! ## Thread Safety:
//! The configuration lives behind `Arc<RwLock<_>>` so the runtime config
//! endpoint can update it while handlers read it; the matchmaking service
//! holds the same handle and picks up threshold changes on its next pass.
//! The service itself does its own internal locking, so `AppState` is cheap
//! to clone into each actix worker.

use crate::config::AppConfig;
use crate::matching::service::MatchmakingService;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State shared across all request handlers and background jobs.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime).
    pub config: Arc<RwLock<AppConfig>>,

    /// The matchmaking engine: registry, waiting pool and match table.
    pub matchmaking: Arc<MatchmakingService>,

    /// When the server started.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(RwLock::new(config));
        Self {
            matchmaking: Arc::new(MatchmakingService::new(config.clone())),
            config,
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately so other threads are not
    /// blocked while a response is built.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_shares_config_with_service() {
        let state = AppState::new(AppConfig::default());

        let mut updated = state.get_config();
        updated.matching.max_age_gap = 5;
        state.update_config(updated).unwrap();

        // The service reads through the same handle.
        assert_eq!(state.config.read().unwrap().matching.max_age_gap, 5);
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let state = AppState::new(AppConfig::default());
        let mut broken = state.get_config();
        broken.server.port = 0;
        assert!(state.update_config(broken).is_err());
        assert_eq!(state.get_config().server.port, 8080);
    }
}
