//! Engine configuration.
//!
//! Tunables for consensus, streak windows, and the daily cap. Loaded
//! from TOML with every field defaulted, so a missing or partial file
//! still yields a working engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum vote count before a trend can resolve
    pub quorum: u32,
    /// Yes-ratio at or above which a trend validates
    pub validate_ratio: f64,
    /// Yes-ratio at or below which a trend rejects
    pub reject_ratio: f64,
    /// Maximum voting window before the expiry sweep force-resolves
    pub voting_window_hours: i64,
    /// Maximum positive XP per user per UTC calendar day
    pub daily_xp_cap: i64,
    /// Session streak window
    pub session_window_minutes: i64,
    /// Flat bonus added to the first submission of a UTC day (0 disables)
    pub first_of_day_bonus: i64,
    /// Whether a submitter may vote on their own trend
    pub allow_self_votes: bool,
    /// Internal retries for transient storage conflicts
    pub conflict_retries: u32,
    /// Outbox attempts before an entry is marked dead
    pub outbox_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quorum: 10,
            validate_ratio: 0.70,
            reject_ratio: 0.30,
            voting_window_hours: 72,
            daily_xp_cap: 5000,
            session_window_minutes: 5,
            first_of_day_bonus: 20,
            allow_self_votes: false,
            conflict_retries: 3,
            outbox_max_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file; missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn session_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_window_minutes)
    }

    pub fn voting_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.voting_window_hours)
    }
}
