//! Submission Intake.
//!
//! Creates a trend in PENDING state and pays the base+quality submission
//! reward. The creation itself is the reconciler step for an outbox
//! entry: trend insert, streak advance, reward grant, and achievement
//! checks commit in one transaction, keyed by the pre-generated trend id
//! so replays are no-ops.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use tracing::debug;

use pulse_common::config::EngineConfig;
use pulse_common::error::EngineError;
use pulse_common::ledger::LevelChange;
use pulse_common::trend::{TrendStatus, TrendSubmission, VoteTally};
use pulse_common::xp::{RewardOutcome, XpAction};
use pulse_common::TrendId;

use crate::achieve;
use crate::outbox::OutboxEntry;
use crate::rewards;
use crate::store;
use crate::streaks;

/// Outcome of a submit operation
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub trend_id: TrendId,
    pub status: TrendStatus,
    /// None when the entry stayed queued for the background reconciler
    pub reward: Option<RewardOutcome>,
    pub level_change: Option<LevelChange>,
    /// True when intake could not complete synchronously
    pub queued: bool,
}

/// Result of processing one outbox entry
#[derive(Debug, Clone)]
pub struct ProcessedEntry {
    pub reward: RewardOutcome,
    pub level_change: Option<LevelChange>,
}

/// Process one outbox entry: create the trend and pay the submission
/// reward. Runs inside the caller's transaction. Returns None when the
/// trend already exists (an idempotent replay).
pub fn process_entry_tx(
    conn: &Connection,
    config: &EngineConfig,
    entry: &OutboxEntry,
    now: DateTime<Utc>,
) -> Result<Option<ProcessedEntry>, EngineError> {
    if store::trend_exists(conn, &entry.trend_id)? {
        debug!(trend = %entry.trend_id, "replayed submission, trend already exists");
        crate::outbox::mark_done(conn, &entry.trend_id)?;
        return Ok(None);
    }

    store::insert_trend(
        conn,
        &TrendSubmission {
            id: entry.trend_id.clone(),
            submitter_id: entry.submitter_id.clone(),
            category: entry.payload.category,
            platform: entry.payload.platform,
            quality_score: entry.payload.quality_score,
            status: TrendStatus::Pending,
            tally: VoteTally::default(),
            created_at: now,
            resolved_at: None,
        },
    )?;

    // Submission is a qualifying action: streaks advance first so the
    // reward sees this action's multipliers.
    let advance = streaks::advance_for_action(conn, config, &entry.submitter_id, now)?;
    let grant = rewards::grant(
        conn,
        config,
        &entry.submitter_id,
        XpAction::TrendSubmission,
        Some(entry.payload.quality_score),
        advance.first_of_day,
        streaks::CurrentMultipliers {
            session: advance.session_multiplier,
            daily: advance.daily_multiplier,
        },
        json!({
            "trend_id": entry.trend_id,
            "category": entry.payload.category,
            "platform": entry.payload.platform,
        }),
        now,
    )?;
    achieve::check_after_submission(conn, config, &entry.submitter_id, advance.daily_streak, now)?;

    crate::outbox::mark_done(conn, &entry.trend_id)?;

    Ok(Some(ProcessedEntry {
        reward: grant.outcome,
        level_change: grant.level_change,
    }))
}
