//! XP ledger types.
//!
//! The ledger is append-only and is the sole source of truth for a
//! user's XP. Entries are never updated or deleted; the summary total is
//! always recomputable by summing deltas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::{LevelProgress, LevelInfo};
use crate::UserId;

/// One immutable, signed XP delta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Row id assigned by the store
    pub id: i64,
    pub user_id: UserId,
    /// Action kind string, see `XpAction::event_type`
    pub event_type: String,
    pub xp_delta: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Derived per-user XP view. Recomputed from the ledger on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpSummary {
    pub user_id: UserId,
    pub total_xp: i64,
    pub level: u8,
    pub title: String,
    pub multiplier: f64,
    pub progress: LevelProgress,
    pub session_streak: u32,
    pub daily_streak: u32,
}

impl XpSummary {
    pub fn from_parts(
        user_id: UserId,
        total_xp: i64,
        level: LevelInfo,
        progress: LevelProgress,
        session_streak: u32,
        daily_streak: u32,
    ) -> Self {
        Self {
            user_id,
            total_xp,
            level: level.level,
            title: level.title.to_string(),
            multiplier: level.multiplier,
            progress,
            session_streak,
            daily_streak,
        }
    }
}

/// Level change detected while granting a reward. Observable signal, not
/// state: consumers react to it (notifications, display), the engine only
/// logs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelChange {
    pub from: u8,
    pub to: u8,
    pub title: String,
}

impl LevelChange {
    pub fn is_level_up(&self) -> bool {
        self.to > self.from
    }
}
