//! Reward Calculator - pure computation half.
//!
//! Combines a base action amount, a flat quality bonus, and the three
//! multipliers (level, session streak, daily streak) into a final XP
//! delta under the daily cap. Deterministic and side-effect free; the
//! engine owns ledger appends and level-up detection.
//!
//! ## Base amounts
//!
//! | Action               | Base XP | Multiplied |
//! |----------------------|---------|------------|
//! | TrendSubmission      | +25     | yes        |
//! | ValidationVote       | +5      | yes        |
//! | ConsensusValidated   | +50     | yes        |
//! | ConsensusRejected    | -10     | no (flat)  |
//! | AccurateValidation   | +10     | yes        |
//! | AchievementUnlocked  | varies  | no (flat)  |
//!
//! Multipliers apply only to non-penalty amounts; the rejection penalty
//! stays flat and is never capped.

use serde::{Deserialize, Serialize};

use crate::achievements::Achievement;

/// An XP-earning (or XP-costing) action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpAction {
    /// Trend submitted (paid to the submitter at intake)
    TrendSubmission,
    /// Validation vote cast (paid to the voter at vote time)
    ValidationVote,
    /// Trend reached validated consensus (paid to the submitter)
    ConsensusValidated,
    /// Trend reached rejected consensus (flat penalty to the submitter)
    ConsensusRejected,
    /// Vote matched the eventual majority (paid retroactively at consensus)
    AccurateValidation,
    /// Milestone achievement unlocked (flat award)
    AchievementUnlocked(Achievement),
}

impl XpAction {
    pub fn base_xp(&self) -> i64 {
        match self {
            XpAction::TrendSubmission => 25,
            XpAction::ValidationVote => 5,
            XpAction::ConsensusValidated => 50,
            XpAction::ConsensusRejected => -10,
            XpAction::AccurateValidation => 10,
            XpAction::AchievementUnlocked(a) => a.xp_reward(),
        }
    }

    /// Ledger event_type string for this action
    pub fn event_type(&self) -> &'static str {
        match self {
            XpAction::TrendSubmission => "trend_submitted",
            XpAction::ValidationVote => "validation_vote",
            XpAction::ConsensusValidated => "consensus_validated",
            XpAction::ConsensusRejected => "consensus_rejected",
            XpAction::AccurateValidation => "accurate_validation",
            XpAction::AchievementUnlocked(_) => "achievement_unlocked",
        }
    }

    pub fn is_penalty(&self) -> bool {
        self.base_xp() < 0
    }

    /// Whether the multiplicative step applies. Penalties stay flat, and
    /// achievement awards are fixed milestone amounts.
    pub fn multiplied(&self) -> bool {
        !matches!(
            self,
            XpAction::ConsensusRejected | XpAction::AchievementUnlocked(_)
        )
    }
}

/// Flat quality bonus for a submission, tiered on the quality score.
pub fn quality_bonus(quality_score: f64) -> i64 {
    if quality_score >= 0.9 {
        50
    } else if quality_score >= 0.7 {
        30
    } else if quality_score >= 0.5 {
        10
    } else {
        0
    }
}

/// Inputs to one reward computation
#[derive(Debug, Clone, Copy)]
pub struct RewardInput {
    pub action: XpAction,
    /// Quality score in [0, 1]; only consulted for TrendSubmission
    pub quality_score: Option<f64>,
    /// Flat first-of-day bonus (0 when not applicable or disabled)
    pub first_of_day_bonus: i64,
    pub level_multiplier: f64,
    pub session_multiplier: f64,
    pub daily_multiplier: f64,
    /// Sum of today's positive deltas already awarded to the user
    pub daily_xp_so_far: i64,
    pub daily_cap: i64,
}

/// Outcome of one reward computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardOutcome {
    /// Final (possibly clamped) XP delta
    pub delta: i64,
    /// Whether the daily cap clamped the award
    pub capped: bool,
    /// Human-readable breakdown for logs and CLI display
    pub breakdown: Vec<String>,
}

/// Compute the XP delta for one action. Pure and deterministic: replaying
/// identical inputs yields identical output.
pub fn compute_reward(input: &RewardInput) -> RewardOutcome {
    let base = input.action.base_xp();
    let mut breakdown = vec![format!("base {}: {:+}", input.action.event_type(), base)];

    // Penalties bypass bonuses, multipliers, and the cap.
    if input.action.is_penalty() {
        breakdown.push(format!("flat penalty: {:+}", base));
        return RewardOutcome {
            delta: base,
            capped: false,
            breakdown,
        };
    }

    let mut flat = base;
    if input.action == XpAction::TrendSubmission {
        if let Some(score) = input.quality_score {
            let bonus = quality_bonus(score);
            if bonus > 0 {
                breakdown.push(format!("quality {:.2}: +{}", score, bonus));
                flat += bonus;
            }
        }
        if input.first_of_day_bonus > 0 {
            breakdown.push(format!("first of day: +{}", input.first_of_day_bonus));
            flat += input.first_of_day_bonus;
        }
    }

    let raw = if input.action.multiplied() {
        let multiplied = flat as f64
            * input.level_multiplier
            * input.session_multiplier
            * input.daily_multiplier;
        breakdown.push(format!(
            "x{:.2} level, x{:.2} session, x{:.2} daily",
            input.level_multiplier, input.session_multiplier, input.daily_multiplier
        ));
        multiplied.round() as i64
    } else {
        flat
    };

    // Daily cap clamps positive awards only.
    let headroom = (input.daily_cap - input.daily_xp_so_far).max(0);
    let (delta, capped) = if raw > headroom {
        breakdown.push(format!("daily cap: {} -> {}", raw, headroom));
        (headroom, true)
    } else {
        (raw, false)
    };

    breakdown.push(format!("total: {:+}", delta));
    RewardOutcome {
        delta,
        capped,
        breakdown,
    }
}
