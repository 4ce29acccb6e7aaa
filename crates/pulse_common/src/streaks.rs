//! Streak Tracker - pure math half.
//!
//! Session streaks reward rapid consecutive qualifying actions (<= 5 min
//! apart); daily streaks reward consecutive calendar days with activity.
//! The state transitions here are pure; the engine persists the resulting
//! state under its per-user write discipline.
//!
//! Daily streak convention: a qualifying action after a gap (or the first
//! ever) establishes day 1 but the counter reports 0 until the next
//! calendar day confirms continuation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Session multiplier by position (1-based). Positions beyond 5 reuse the
/// position-5 multiplier.
pub fn session_multiplier(position: u32) -> f64 {
    match position {
        0 | 1 => 1.0,
        2 => 1.2,
        3 => 1.5,
        4 => 2.0,
        _ => 2.5,
    }
}

/// Daily multiplier by streak count, lower bound inclusive.
pub fn daily_multiplier(days: u32) -> f64 {
    match days {
        d if d >= 30 => 3.0,
        d if d >= 14 => 2.5,
        d if d >= 7 => 2.0,
        d if d >= 3 => 1.5,
        d if d >= 1 => 1.2,
        _ => 1.0,
    }
}

/// Per-user streak state, one row per user in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakState {
    pub user_id: UserId,
    pub session_streak_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_last_event_at: Option<DateTime<Utc>>,
    pub daily_streak_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_last_event_date: Option<NaiveDate>,
}

impl StreakState {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            session_streak_count: 0,
            session_last_event_at: None,
            daily_streak_count: 0,
            daily_last_event_date: None,
        }
    }
}

/// Result of advancing streak state for one qualifying action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreakAdvance {
    /// Session position of this action (1-based, uncapped)
    pub session_position: u32,
    /// Daily streak count after the action
    pub daily_streak: u32,
    /// Whether this is the first qualifying action of the calendar day
    pub first_of_day: bool,
    pub session_multiplier: f64,
    pub daily_multiplier: f64,
}

/// Advance both counters for a qualifying action at `now` (server clock).
///
/// Mutates `state` in place and returns the multipliers the action earns.
pub fn advance(state: &mut StreakState, now: DateTime<Utc>, session_window: Duration) -> StreakAdvance {
    // Session streak: within the window increments, otherwise resets to 1.
    let session_position = match state.session_last_event_at {
        Some(last) if now.signed_duration_since(last) <= session_window => {
            state.session_streak_count + 1
        }
        _ => 1,
    };
    state.session_streak_count = session_position;
    state.session_last_event_at = Some(now);

    // Daily streak: same day no change, next day increments, gap resets.
    let today = now.date_naive();
    let (daily_streak, first_of_day) = match state.daily_last_event_date {
        Some(last) if last == today => (state.daily_streak_count, false),
        Some(last) if last.succ_opt() == Some(today) => (state.daily_streak_count + 1, true),
        _ => (0, true),
    };
    state.daily_streak_count = daily_streak;
    state.daily_last_event_date = Some(today);

    StreakAdvance {
        session_position,
        daily_streak,
        first_of_day,
        session_multiplier: session_multiplier(session_position),
        daily_multiplier: daily_multiplier(daily_streak),
    }
}
