//! Pulse Common - Shared domain types for the TrendPulse validation engine.
//!
//! Everything the engine and CLI agree on lives here: the closed
//! category/platform taxonomy, trend and vote records, the XP ledger
//! schema, the level table, streak math, and the pure reward calculator.

pub mod achievements;
pub mod config;
pub mod error;
pub mod ledger;
pub mod progression;
pub mod streaks;
pub mod taxonomy;
pub mod trend;
pub mod xp;

pub use error::EngineError;

/// Default engine database path
pub const DEFAULT_DB_PATH: &str = "/var/lib/trendpulse/engine.db";

/// Default engine config path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/trendpulse/engine.toml";

/// User identifier (opaque, assigned by the surrounding application)
pub type UserId = String;

/// Trend identifier (uuid v4, assigned at intake)
pub type TrendId = String;
