//! Milestone achievement checks.
//!
//! Runs after submissions and votes inside the same transaction. Unlocks
//! are recorded once per (user, achievement); each unlock appends a flat
//! XP award to the ledger.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use pulse_common::achievements::{satisfied, Achievement, MilestoneCounters};
use pulse_common::config::EngineConfig;
use pulse_common::error::EngineError;
use pulse_common::xp::XpAction;

use crate::rewards;
use crate::store;
use crate::streaks::CurrentMultipliers;

/// Check and unlock milestones after a trend submission.
pub fn check_after_submission(
    conn: &Connection,
    config: &EngineConfig,
    user_id: &str,
    daily_streak: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Achievement>, EngineError> {
    let counters = MilestoneCounters {
        trends_submitted: store::trends_submitted_count(conn, user_id)?,
        votes_cast: 0,
        daily_streak,
    };
    unlock_new(conn, config, user_id, &counters, now)
}

/// Check and unlock milestones after a validation vote.
pub fn check_after_vote(
    conn: &Connection,
    config: &EngineConfig,
    user_id: &str,
    daily_streak: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Achievement>, EngineError> {
    let counters = MilestoneCounters {
        trends_submitted: 0,
        votes_cast: store::votes_cast_count(conn, user_id)?,
        daily_streak,
    };
    unlock_new(conn, config, user_id, &counters, now)
}

fn unlock_new(
    conn: &Connection,
    config: &EngineConfig,
    user_id: &str,
    counters: &MilestoneCounters,
    now: DateTime<Utc>,
) -> Result<Vec<Achievement>, EngineError> {
    let mut unlocked = Vec::new();
    for achievement in satisfied(counters) {
        if !store::try_unlock_achievement(conn, user_id, achievement.id(), now)? {
            continue;
        }
        info!(
            user = user_id,
            achievement = achievement.id(),
            xp = achievement.xp_reward(),
            "achievement unlocked"
        );
        rewards::grant(
            conn,
            config,
            user_id,
            XpAction::AchievementUnlocked(achievement),
            None,
            false,
            CurrentMultipliers {
                session: 1.0,
                daily: 1.0,
            },
            json!({"achievement": achievement.id(), "name": achievement.name()}),
            now,
        )?;
        unlocked.push(achievement);
    }
    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TrendStore;
    use pulse_common::taxonomy::{Category, Platform};
    use pulse_common::trend::{TrendStatus, TrendSubmission, VoteTally};

    fn seed_trend(conn: &Connection, submitter: &str, id: &str) {
        store::insert_trend(
            conn,
            &TrendSubmission {
                id: id.to_string(),
                submitter_id: submitter.to_string(),
                category: Category::Gaming,
                platform: Platform::Youtube,
                quality_score: 0.5,
                status: TrendStatus::Pending,
                tally: VoteTally::default(),
                created_at: Utc::now(),
                resolved_at: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_first_trend_unlocks_once() {
        let db = TrendStore::open_in_memory().unwrap();
        let config = EngineConfig::default();
        let now = Utc::now();

        seed_trend(db.conn(), "u1", "t1");
        let first = check_after_submission(db.conn(), &config, "u1", 0, now).unwrap();
        assert_eq!(first, vec![Achievement::FirstTrend]);
        assert_eq!(store::total_xp(db.conn(), "u1").unwrap(), 100);

        seed_trend(db.conn(), "u1", "t2");
        let second = check_after_submission(db.conn(), &config, "u1", 0, now).unwrap();
        assert!(second.is_empty());
        assert_eq!(store::total_xp(db.conn(), "u1").unwrap(), 100);
    }

    #[test]
    fn test_streak_milestone_via_submission() {
        let db = TrendStore::open_in_memory().unwrap();
        let config = EngineConfig::default();
        let now = Utc::now();

        seed_trend(db.conn(), "u1", "t1");
        let unlocked = check_after_submission(db.conn(), &config, "u1", 7, now).unwrap();
        assert!(unlocked.contains(&Achievement::FirstTrend));
        assert!(unlocked.contains(&Achievement::PerfectWeek));
        assert_eq!(store::total_xp(db.conn(), "u1").unwrap(), 600);
    }
}
