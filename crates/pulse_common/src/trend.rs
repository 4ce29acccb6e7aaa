//! Trend submission and validation vote records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::taxonomy::{Category, Platform};
use crate::{TrendId, UserId};

/// Lifecycle status of a trend submission.
///
/// Status is monotone: once Validated or Rejected it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStatus {
    Pending,
    Validated,
    Rejected,
}

impl TrendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendStatus::Pending => "pending",
            TrendStatus::Validated => "validated",
            TrendStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TrendStatus::Pending),
            "validated" => Some(TrendStatus::Validated),
            "rejected" => Some(TrendStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrendStatus::Pending)
    }
}

impl std::fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single validation vote value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Yes,
    No,
    Unsure,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Yes => "yes",
            VoteValue::No => "no",
            VoteValue::Unsure => "unsure",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "yes" => Ok(VoteValue::Yes),
            "no" => Ok(VoteValue::No),
            "unsure" => Ok(VoteValue::Unsure),
            other => Err(EngineError::InvalidVoteValue(other.to_string())),
        }
    }
}

impl std::fmt::Display for VoteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vote tally for one trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub yes: u32,
    pub no: u32,
    pub unsure: u32,
}

impl VoteTally {
    pub fn total(&self) -> u32 {
        self.yes + self.no + self.unsure
    }

    /// Fraction of yes votes over all votes. Zero when no votes exist.
    pub fn yes_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.yes as f64 / total as f64
    }

    pub fn record(&mut self, vote: VoteValue) {
        match vote {
            VoteValue::Yes => self.yes += 1,
            VoteValue::No => self.no += 1,
            VoteValue::Unsure => self.unsure += 1,
        }
    }
}

/// A submitted trend observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSubmission {
    pub id: TrendId,
    pub submitter_id: UserId,
    pub category: Category,
    pub platform: Platform,
    /// Heuristic quality score in [0, 1], assigned at intake
    pub quality_score: f64,
    pub status: TrendStatus,
    pub tally: VoteTally,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Submission payload accepted by the intake operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub category: Category,
    pub platform: Platform,
    pub quality_score: f64,
}

impl SubmitPayload {
    pub fn new(category: Category, platform: Platform, quality_score: f64) -> Self {
        Self {
            category,
            platform,
            quality_score: quality_score.clamp(0.0, 1.0),
        }
    }
}

/// A recorded validation vote. Immutable once cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVote {
    pub trend_id: TrendId,
    pub voter_id: UserId,
    pub vote: VoteValue,
    pub created_at: DateTime<Utc>,
}
