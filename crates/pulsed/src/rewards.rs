//! Reward granting - the side-effect half of the Reward Calculator.
//!
//! Wraps the pure computation with the ledger append, summary
//! re-aggregation, daily-cap lookup, and level-change detection. Every
//! grant runs inside the caller's transaction, so the ledger entry and
//! any consequential level change commit (or roll back) together.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

use pulse_common::config::EngineConfig;
use pulse_common::error::EngineError;
use pulse_common::ledger::LevelChange;
use pulse_common::progression::level_for;
use pulse_common::xp::{compute_reward, RewardInput, RewardOutcome, XpAction};

use crate::store;
use crate::streaks::CurrentMultipliers;

/// Result of one grant
#[derive(Debug, Clone)]
pub struct GrantResult {
    pub outcome: RewardOutcome,
    pub total_xp_after: i64,
    pub level_change: Option<LevelChange>,
}

/// Start of the current UTC calendar day (daily caps reset at midnight UTC)
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// Grant one XP action to a user.
///
/// The daily-XP-so-far figure is re-aggregated from the ledger inside
/// this transaction, never read from a cached total.
pub fn grant(
    conn: &Connection,
    config: &EngineConfig,
    user_id: &str,
    action: XpAction,
    quality_score: Option<f64>,
    first_of_day: bool,
    multipliers: CurrentMultipliers,
    extra_metadata: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<GrantResult, EngineError> {
    let total_before = store::total_xp(conn, user_id)?;
    let level_before = level_for(total_before);

    let daily_so_far = store::positive_xp_since(conn, user_id, day_start(now))?;
    let input = RewardInput {
        action,
        quality_score,
        first_of_day_bonus: if first_of_day { config.first_of_day_bonus } else { 0 },
        level_multiplier: level_before.multiplier,
        session_multiplier: multipliers.session,
        daily_multiplier: multipliers.daily,
        daily_xp_so_far: daily_so_far,
        daily_cap: config.daily_xp_cap,
    };
    let outcome = compute_reward(&input);

    if outcome.capped {
        // Clamped, not failed: surfaced to the caller and to observability.
        warn!(
            user = user_id,
            event = action.event_type(),
            so_far = daily_so_far,
            cap = config.daily_xp_cap,
            "daily XP cap reached, award clamped to {}",
            outcome.delta
        );
    }

    let mut metadata = extra_metadata;
    if let serde_json::Value::Object(ref mut map) = metadata {
        map.insert("breakdown".to_string(), json!(outcome.breakdown));
        if outcome.capped {
            map.insert("capped".to_string(), json!(true));
        }
    }
    store::append_ledger(
        conn,
        user_id,
        action.event_type(),
        outcome.delta,
        now,
        Some(&metadata),
    )?;

    let total_after = store::total_xp(conn, user_id)?;
    let level_after = level_for(total_after);
    let level_change = if level_after.level != level_before.level {
        info!(
            user = user_id,
            from = level_before.level,
            to = level_after.level,
            title = level_after.title,
            "level changed"
        );
        Some(LevelChange {
            from: level_before.level,
            to: level_after.level,
            title: level_after.title.to_string(),
        })
    } else {
        None
    };

    Ok(GrantResult {
        outcome,
        total_xp_after: total_after,
        level_change,
    })
}
