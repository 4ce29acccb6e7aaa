//! Validation Ballot Box.
//!
//! Per-trend consensus state machine: PENDING -> VALIDATED | REJECTED.
//! One immutable vote per distinct voter; at quorum the yes-ratio decides
//! the transition. The vote insert, tally update, quorum check, status
//! CAS, and all consensus payouts run in the caller's transaction, so a
//! quorum-boundary race resolves the trend exactly once.
//!
//! Accuracy bonuses for voters matching the majority are computed
//! retroactively at consensus time; the majority is unknowable earlier.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use pulse_common::config::EngineConfig;
use pulse_common::error::EngineError;
use pulse_common::ledger::LevelChange;
use pulse_common::trend::{TrendStatus, TrendSubmission, ValidationVote, VoteTally, VoteValue};
use pulse_common::xp::{RewardOutcome, XpAction};
use pulse_common::TrendId;

use crate::achieve;
use crate::rewards;
use crate::store;
use crate::streaks;

/// Outcome of a cast-vote operation
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    /// False when the trend was already resolved (vote not recorded)
    pub accepted: bool,
    pub status_after: TrendStatus,
    /// The voter's base vote reward, when the vote was recorded
    pub reward: Option<RewardOutcome>,
    pub level_change: Option<LevelChange>,
    /// Present when this vote resolved the trend
    pub resolution: Option<Resolution>,
}

/// A consensus resolution event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub trend_id: TrendId,
    pub status: TrendStatus,
    pub tally: VoteTally,
    /// Signed delta applied to the submitter (0 for an ambiguous expiry)
    pub submitter_delta: i64,
    /// Number of voters who received the accuracy bonus
    pub accuracy_bonuses: usize,
    /// Whether the expiry sweep forced this resolution
    pub expired: bool,
}

/// What the tally implies once quorum is reached
fn consensus_status(config: &EngineConfig, tally: &VoteTally) -> Option<TrendStatus> {
    if tally.total() < config.quorum {
        return None;
    }
    let ratio = tally.yes_ratio();
    if ratio >= config.validate_ratio {
        Some(TrendStatus::Validated)
    } else if ratio <= config.reject_ratio {
        Some(TrendStatus::Rejected)
    } else {
        None
    }
}

/// Cast one vote. Runs inside the caller's transaction.
pub fn cast_vote_tx(
    conn: &Connection,
    config: &EngineConfig,
    trend_id: &str,
    voter_id: &str,
    vote: VoteValue,
    now: DateTime<Utc>,
) -> Result<VoteOutcome, EngineError> {
    let trend = store::get_trend(conn, trend_id)?
        .ok_or_else(|| EngineError::TrendNotFound(trend_id.to_string()))?;

    // Already-resolved trends accept no further votes; not an error, the
    // caller learns the final status instead.
    if trend.status.is_terminal() {
        debug!(trend = trend_id, status = %trend.status, "vote after resolution ignored");
        return Ok(VoteOutcome {
            accepted: false,
            status_after: trend.status,
            reward: None,
            level_change: None,
            resolution: None,
        });
    }

    if !config.allow_self_votes && trend.submitter_id == voter_id {
        return Err(EngineError::SelfVote);
    }
    if store::has_voted(conn, trend_id, voter_id)? {
        return Err(EngineError::DuplicateVote);
    }

    store::insert_vote(
        conn,
        &ValidationVote {
            trend_id: trend_id.to_string(),
            voter_id: voter_id.to_string(),
            vote,
            created_at: now,
        },
    )?;
    let mut tally = trend.tally;
    tally.record(vote);

    // Voting is a qualifying action: streaks advance and the base vote
    // reward earns the voter's multipliers.
    let advance = streaks::advance_for_action(conn, config, voter_id, now)?;
    let grant = rewards::grant(
        conn,
        config,
        voter_id,
        XpAction::ValidationVote,
        None,
        false,
        streaks::CurrentMultipliers {
            session: advance.session_multiplier,
            daily: advance.daily_multiplier,
        },
        json!({"trend_id": trend_id, "vote": vote.as_str()}),
        now,
    )?;
    achieve::check_after_vote(conn, config, voter_id, advance.daily_streak, now)?;

    let resolution = match consensus_status(config, &tally) {
        // A quorum resolution is a true consensus: rejection carries the
        // penalty.
        Some(status) => resolve_tx(conn, config, &trend, tally, status, true, false, now)?,
        None => None,
    };

    let status_after = resolution
        .as_ref()
        .map(|r| r.status)
        .unwrap_or(TrendStatus::Pending);

    Ok(VoteOutcome {
        accepted: true,
        status_after,
        reward: Some(grant.outcome),
        level_change: grant.level_change,
        resolution,
    })
}

/// Transition a trend to a terminal status and apply consensus payouts.
///
/// The CAS refuses a second transition, so payouts happen exactly once
/// even if two writers race across the quorum boundary.
fn resolve_tx(
    conn: &Connection,
    config: &EngineConfig,
    trend: &TrendSubmission,
    tally: VoteTally,
    status: TrendStatus,
    apply_penalty: bool,
    expired: bool,
    now: DateTime<Utc>,
) -> Result<Option<Resolution>, EngineError> {
    if !store::cas_resolve(conn, &trend.id, status, now)? {
        debug!(trend = %trend.id, "resolution lost the race, skipping payouts");
        return Ok(None);
    }

    info!(
        trend = %trend.id,
        status = %status,
        yes = tally.yes,
        no = tally.no,
        unsure = tally.unsure,
        expired,
        "trend resolved"
    );

    let mut submitter_delta = 0i64;
    let mut accuracy_bonuses = 0usize;

    match status {
        TrendStatus::Validated => {
            let multipliers = streaks::current_multipliers(conn, &trend.submitter_id)?;
            let grant = rewards::grant(
                conn,
                config,
                &trend.submitter_id,
                XpAction::ConsensusValidated,
                None,
                false,
                multipliers,
                json!({"trend_id": trend.id}),
                now,
            )?;
            submitter_delta = grant.outcome.delta;

            // Retroactive accuracy bonus for everyone who voted yes
            for voter in store::voters_for_value(conn, &trend.id, VoteValue::Yes)? {
                let multipliers = streaks::current_multipliers(conn, &voter)?;
                rewards::grant(
                    conn,
                    config,
                    &voter,
                    XpAction::AccurateValidation,
                    None,
                    false,
                    multipliers,
                    json!({"trend_id": trend.id}),
                    now,
                )?;
                accuracy_bonuses += 1;
            }
        }
        TrendStatus::Rejected => {
            // An ambiguous expiry rejects without punishing the submitter;
            // a true negative consensus applies the flat penalty.
            if apply_penalty {
                let multipliers = streaks::current_multipliers(conn, &trend.submitter_id)?;
                let grant = rewards::grant(
                    conn,
                    config,
                    &trend.submitter_id,
                    XpAction::ConsensusRejected,
                    None,
                    false,
                    multipliers,
                    json!({"trend_id": trend.id, "expired": expired}),
                    now,
                )?;
                submitter_delta = grant.outcome.delta;
            }
        }
        TrendStatus::Pending => unreachable!("resolve_tx called with a terminal status"),
    }

    Ok(Some(Resolution {
        trend_id: trend.id.clone(),
        status,
        tally,
        submitter_delta,
        accuracy_bonuses,
        expired,
    }))
}

/// Force-resolve a trend whose voting window has elapsed.
///
/// Uses the same ratio thresholds as quorum resolution but without the
/// quorum floor. An ambiguous or empty tally rejects without the penalty.
/// Already-resolved trends and trends still inside the window are a
/// no-op returning None; unknown trends error.
pub fn resolve_or_expire_tx(
    conn: &Connection,
    config: &EngineConfig,
    trend_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Resolution>, EngineError> {
    let trend = store::get_trend(conn, trend_id)?
        .ok_or_else(|| EngineError::TrendNotFound(trend_id.to_string()))?;

    if trend.status.is_terminal() {
        return Ok(None);
    }
    if now.signed_duration_since(trend.created_at) < config.voting_window() {
        return Ok(None);
    }

    let tally = trend.tally;
    let ratio = tally.yes_ratio();
    let (status, apply_penalty) = if tally.total() > 0 && ratio >= config.validate_ratio {
        (TrendStatus::Validated, false)
    } else if tally.total() > 0 && ratio <= config.reject_ratio {
        // Clear negative partial consensus: rejected with the penalty
        (TrendStatus::Rejected, true)
    } else {
        // Ambiguous or empty after the window: rejected, no penalty
        (TrendStatus::Rejected, false)
    };

    resolve_tx(conn, config, &trend, tally, status, apply_penalty, true, now)
}
