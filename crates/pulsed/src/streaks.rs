//! Streak Tracker - store-backed half.
//!
//! Read-modify-write of the per-user streak row. Serialized per user by
//! the engine's single-writer transaction discipline: both counters are
//! loaded, advanced, and written back inside the caller's transaction,
//! so two near-simultaneous actions by the same user cannot both observe
//! the same prior position.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use pulse_common::config::EngineConfig;
use pulse_common::error::EngineError;
use pulse_common::streaks::{self, StreakAdvance};

use crate::store;

/// Streak multipliers currently in effect for a user, without advancing
/// the counters (used for consensus-time payouts).
#[derive(Debug, Clone, Copy)]
pub struct CurrentMultipliers {
    pub session: f64,
    pub daily: f64,
}

/// Advance both streak counters for a qualifying action.
pub fn advance_for_action(
    conn: &Connection,
    config: &EngineConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<StreakAdvance, EngineError> {
    let mut state = store::get_streak(conn, user_id)?;
    let advance = streaks::advance(&mut state, now, config.session_window());
    store::upsert_streak(conn, &state)?;
    debug!(
        user = user_id,
        session = advance.session_position,
        daily = advance.daily_streak,
        "streak advanced"
    );
    Ok(advance)
}

/// Multipliers from the stored counters as they stand.
pub fn current_multipliers(
    conn: &Connection,
    user_id: &str,
) -> Result<CurrentMultipliers, EngineError> {
    let state = store::get_streak(conn, user_id)?;
    Ok(CurrentMultipliers {
        session: streaks::session_multiplier(state.session_streak_count),
        daily: streaks::daily_multiplier(state.daily_streak_count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TrendStore;
    use chrono::{Duration, NaiveDate};
    use pulse_common::streaks::StreakState;

    #[test]
    fn test_advance_persists_state() {
        let db = TrendStore::open_in_memory().unwrap();
        let config = EngineConfig::default();
        let now = Utc::now();

        let first = advance_for_action(db.conn(), &config, "u1", now).unwrap();
        assert_eq!(first.session_position, 1);
        assert_eq!(first.daily_streak, 0);

        let second = advance_for_action(db.conn(), &config, "u1", now + Duration::minutes(1)).unwrap();
        assert_eq!(second.session_position, 2);
        assert!(!second.first_of_day);
    }

    #[test]
    fn test_daily_continuation_from_stored_state() {
        let db = TrendStore::open_in_memory().unwrap();
        let config = EngineConfig::default();
        let now = Utc::now();

        // Seed a 6-day streak last touched yesterday
        let yesterday = now.date_naive().pred_opt().unwrap();
        store::upsert_streak(
            db.conn(),
            &StreakState {
                user_id: "u1".to_string(),
                session_streak_count: 1,
                session_last_event_at: Some(now - Duration::days(1)),
                daily_streak_count: 6,
                daily_last_event_date: Some(yesterday),
            },
        )
        .unwrap();

        let advance = advance_for_action(db.conn(), &config, "u1", now).unwrap();
        assert_eq!(advance.daily_streak, 7);
        assert_eq!(advance.daily_multiplier, 2.0);
        assert!(advance.first_of_day);
        // A day-old session window resets the session position
        assert_eq!(advance.session_position, 1);
    }

    #[test]
    fn test_gap_resets_daily_streak() {
        let db = TrendStore::open_in_memory().unwrap();
        let config = EngineConfig::default();
        let now = Utc::now();

        let stale = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        store::upsert_streak(
            db.conn(),
            &StreakState {
                user_id: "u1".to_string(),
                session_streak_count: 4,
                session_last_event_at: None,
                daily_streak_count: 12,
                daily_last_event_date: Some(stale),
            },
        )
        .unwrap();

        let advance = advance_for_action(db.conn(), &config, "u1", now).unwrap();
        assert_eq!(advance.daily_streak, 0);
        assert_eq!(advance.daily_multiplier, 1.0);
    }

    #[test]
    fn test_current_multipliers_do_not_advance() {
        let db = TrendStore::open_in_memory().unwrap();
        store::upsert_streak(
            db.conn(),
            &StreakState {
                user_id: "u1".to_string(),
                session_streak_count: 3,
                session_last_event_at: Some(Utc::now()),
                daily_streak_count: 7,
                daily_last_event_date: Some(Utc::now().date_naive()),
            },
        )
        .unwrap();

        let mults = current_multipliers(db.conn(), "u1").unwrap();
        assert_eq!(mults.session, 1.5);
        assert_eq!(mults.daily, 2.0);

        // Reading twice changes nothing
        let again = current_multipliers(db.conn(), "u1").unwrap();
        assert_eq!(again.session, 1.5);
    }
}
