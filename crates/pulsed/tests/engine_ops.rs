//! End-to-end engine tests: intake, voting, consensus, expiry, caps.

use std::sync::Arc;
use std::thread;

use pulse_common::config::EngineConfig;
use pulse_common::error::EngineError;
use pulse_common::taxonomy::{Category, Platform};
use pulse_common::trend::{SubmitPayload, TrendStatus, VoteValue};
use pulsed::store::{self, TrendStore};
use pulsed::TrendEngine;

/// Config with the first-of-day bonus disabled so reward arithmetic
/// matches the base tables exactly.
fn plain_config() -> EngineConfig {
    EngineConfig {
        first_of_day_bonus: 0,
        ..EngineConfig::default()
    }
}

fn payload(quality: f64) -> SubmitPayload {
    SubmitPayload::new(Category::Meme, Platform::Tiktok, quality)
}

#[test]
fn submission_creates_pending_trend_and_pays_reward() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();

    let outcome = engine.submit_trend("alice", payload(0.95)).unwrap();
    assert_eq!(outcome.status, TrendStatus::Pending);
    assert!(!outcome.queued);

    // (25 + 50) * 1.0 * 1.0 * 1.0 = 75
    let reward = outcome.reward.expect("synchronous intake pays the reward");
    assert_eq!(reward.delta, 75);
    assert!(!reward.capped);

    let trend = engine.get_trend(&outcome.trend_id).unwrap();
    assert_eq!(trend.submitter_id, "alice");
    assert_eq!(trend.status, TrendStatus::Pending);
    assert_eq!(trend.tally.total(), 0);

    // Submission reward plus the first_trend achievement (flat 100)
    let summary = engine.user_xp_summary("alice").unwrap();
    assert_eq!(summary.total_xp, 175);
    assert_eq!(summary.level, 2);
}

#[test]
fn duplicate_vote_rejected_and_tally_unchanged() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;

    let first = engine.cast_vote(&trend_id, "bob", VoteValue::Yes).unwrap();
    assert!(first.accepted);

    let err = engine.cast_vote(&trend_id, "bob", VoteValue::No).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateVote));

    let trend = engine.get_trend(&trend_id).unwrap();
    assert_eq!(trend.tally.yes, 1);
    assert_eq!(trend.tally.no, 0);
    assert_eq!(trend.tally.total(), 1);
}

#[test]
fn self_vote_rejected_by_default() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;

    let err = engine.cast_vote(&trend_id, "alice", VoteValue::Yes).unwrap_err();
    assert!(matches!(err, EngineError::SelfVote));
}

#[test]
fn vote_on_unknown_trend_errors() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let err = engine.cast_vote("no-such-trend", "bob", VoteValue::Yes).unwrap_err();
    assert!(matches!(err, EngineError::TrendNotFound(_)));
}

#[test]
fn quorum_with_high_yes_ratio_validates() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;

    // 7 yes, 2 no: still below quorum at 9 votes
    for i in 0..7 {
        let outcome = engine
            .cast_vote(&trend_id, &format!("yes{}", i), VoteValue::Yes)
            .unwrap();
        assert_eq!(outcome.status_after, TrendStatus::Pending);
    }
    for i in 0..2 {
        engine
            .cast_vote(&trend_id, &format!("no{}", i), VoteValue::No)
            .unwrap();
    }

    // 10th vote crosses quorum: 7 yes + 2 no + 1 unsure, ratio 0.70
    let last = engine.cast_vote(&trend_id, "unsure0", VoteValue::Unsure).unwrap();
    assert!(last.accepted);
    assert_eq!(last.status_after, TrendStatus::Validated);

    let trend = engine.get_trend(&trend_id).unwrap();
    assert_eq!(trend.tally.total(), 10);
    assert_eq!(trend.status, TrendStatus::Validated);

    let resolution = last.resolution.expect("the quorum vote resolves");
    assert_eq!(resolution.status, TrendStatus::Validated);
    // All 7 yes-voters got the accuracy bonus
    assert_eq!(resolution.accuracy_bonuses, 7);
    assert!(resolution.submitter_delta > 0);
}

#[test]
fn scenario_c_clear_rejection_applies_flat_penalty() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let trend_id = engine.submit_trend("alice", payload(0.95)).unwrap().trend_id;
    let xp_before = engine.user_xp_summary("alice").unwrap().total_xp;

    // 3 yes, 7 no: ratio 0.30 at quorum rejects
    for i in 0..3 {
        engine
            .cast_vote(&trend_id, &format!("yes{}", i), VoteValue::Yes)
            .unwrap();
    }
    let mut resolution = None;
    for i in 0..7 {
        let outcome = engine
            .cast_vote(&trend_id, &format!("no{}", i), VoteValue::No)
            .unwrap();
        if outcome.resolution.is_some() {
            resolution = outcome.resolution;
        }
    }

    let resolution = resolution.expect("10th vote resolves");
    assert_eq!(resolution.status, TrendStatus::Rejected);
    // Flat -10, unmodified by any multiplier
    assert_eq!(resolution.submitter_delta, -10);
    assert_eq!(resolution.accuracy_bonuses, 0);

    let xp_after = engine.user_xp_summary("alice").unwrap().total_xp;
    assert_eq!(xp_after, xp_before - 10);

    assert_eq!(
        engine.get_trend(&trend_id).unwrap().status,
        TrendStatus::Rejected
    );
}

#[test]
fn votes_after_resolution_are_not_accepted() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;

    for i in 0..8 {
        engine
            .cast_vote(&trend_id, &format!("yes{}", i), VoteValue::Yes)
            .unwrap();
    }
    for i in 0..2 {
        engine
            .cast_vote(&trend_id, &format!("no{}", i), VoteValue::No)
            .unwrap();
    }
    assert_eq!(
        engine.get_trend(&trend_id).unwrap().status,
        TrendStatus::Validated
    );

    let late = engine.cast_vote(&trend_id, "late", VoteValue::No).unwrap();
    assert!(!late.accepted);
    assert_eq!(late.status_after, TrendStatus::Validated);
    assert!(late.reward.is_none());

    // The late vote is not in the tally
    assert_eq!(engine.get_trend(&trend_id).unwrap().tally.total(), 10);
}

#[test]
fn concurrent_quorum_crossing_resolves_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let engine = Arc::new(TrendEngine::open(&db_path, plain_config()).unwrap());

    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;

    // 9 votes: 6 yes, 3 no. The next yes makes 7/10 = 0.70.
    for i in 0..6 {
        engine
            .cast_vote(&trend_id, &format!("yes{}", i), VoteValue::Yes)
            .unwrap();
    }
    for i in 0..3 {
        engine
            .cast_vote(&trend_id, &format!("no{}", i), VoteValue::No)
            .unwrap();
    }

    // Two voters race across the quorum boundary
    let handles: Vec<_> = ["racer1", "racer2"]
        .into_iter()
        .map(|voter| {
            let engine = Arc::clone(&engine);
            let trend_id = trend_id.clone();
            thread::spawn(move || engine.cast_vote(&trend_id, voter, VoteValue::Yes))
        })
        .collect();
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    assert_eq!(
        engine.get_trend(&trend_id).unwrap().status,
        TrendStatus::Validated
    );

    // Exactly one of the racers triggered the resolution
    let resolutions = outcomes.iter().filter(|o| o.resolution.is_some()).count();
    assert_eq!(resolutions, 1);

    // The consensus bonus was paid exactly once
    let raw = TrendStore::open_at(&db_path).unwrap();
    let bonus_entries: i64 = raw
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM xp_ledger
             WHERE user_id = 'alice' AND event_type = 'consensus_validated'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(bonus_entries, 1);
}

#[test]
fn expiry_before_window_is_noop() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;

    assert!(engine.resolve_or_expire(&trend_id).unwrap().is_none());
    assert_eq!(
        engine.get_trend(&trend_id).unwrap().status,
        TrendStatus::Pending
    );
}

/// Backdate a trend past the voting window.
fn backdate_trend(db_path: &std::path::Path, trend_id: &str, hours: i64) {
    let raw = TrendStore::open_at(db_path).unwrap();
    raw.conn()
        .execute(
            "UPDATE trends SET created_at = created_at - ?1 WHERE id = ?2",
            rusqlite::params![hours * 3600, trend_id],
        )
        .unwrap();
}

#[test]
fn expired_trend_with_clear_yes_consensus_validates() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let engine = TrendEngine::open(&db_path, plain_config()).unwrap();

    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;
    for i in 0..3 {
        engine
            .cast_vote(&trend_id, &format!("yes{}", i), VoteValue::Yes)
            .unwrap();
    }
    backdate_trend(&db_path, &trend_id, 80);

    let resolution = engine
        .resolve_or_expire(&trend_id)
        .unwrap()
        .expect("past the window with a clear tally");
    assert_eq!(resolution.status, TrendStatus::Validated);
    assert!(resolution.expired);
    assert_eq!(resolution.accuracy_bonuses, 3);
}

#[test]
fn expired_trend_with_ambiguous_tally_rejects_without_penalty() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let engine = TrendEngine::open(&db_path, plain_config()).unwrap();

    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;
    let xp_before = engine.user_xp_summary("alice").unwrap().total_xp;

    engine.cast_vote(&trend_id, "bob", VoteValue::Yes).unwrap();
    engine.cast_vote(&trend_id, "carol", VoteValue::No).unwrap();
    backdate_trend(&db_path, &trend_id, 80);

    let resolution = engine.resolve_or_expire(&trend_id).unwrap().unwrap();
    assert_eq!(resolution.status, TrendStatus::Rejected);
    assert_eq!(resolution.submitter_delta, 0);

    let xp_after = engine.user_xp_summary("alice").unwrap().total_xp;
    assert_eq!(xp_after, xp_before);
}

#[test]
fn expired_trend_with_clear_no_consensus_rejects_with_penalty() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let engine = TrendEngine::open(&db_path, plain_config()).unwrap();

    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;
    engine.cast_vote(&trend_id, "bob", VoteValue::No).unwrap();
    engine.cast_vote(&trend_id, "carol", VoteValue::No).unwrap();
    backdate_trend(&db_path, &trend_id, 80);

    let resolution = engine.resolve_or_expire(&trend_id).unwrap().unwrap();
    assert_eq!(resolution.status, TrendStatus::Rejected);
    assert_eq!(resolution.submitter_delta, -10);
}

#[test]
fn sweep_resolves_all_stale_trends() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let engine = TrendEngine::open(&db_path, plain_config()).unwrap();

    let stale1 = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;
    let stale2 = engine.submit_trend("bob", payload(0.5)).unwrap().trend_id;
    let fresh = engine.submit_trend("carol", payload(0.5)).unwrap().trend_id;
    backdate_trend(&db_path, &stale1, 80);
    backdate_trend(&db_path, &stale2, 100);

    assert_eq!(engine.sweep_expired().unwrap(), 2);
    assert!(engine.get_trend(&stale1).unwrap().status.is_terminal());
    assert!(engine.get_trend(&stale2).unwrap().status.is_terminal());
    assert_eq!(engine.get_trend(&fresh).unwrap().status, TrendStatus::Pending);

    // A second sweep finds nothing
    assert_eq!(engine.sweep_expired().unwrap(), 0);
}

#[test]
fn scenario_d_daily_cap_clamps_at_engine_level() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let engine = TrendEngine::open(&db_path, plain_config()).unwrap();

    // 4990 of the 5000 cap already awarded today
    {
        let raw = TrendStore::open_at(&db_path).unwrap();
        store::append_ledger(
            raw.conn(),
            "alice",
            "trend_submitted",
            4990,
            chrono::Utc::now(),
            None,
        )
        .unwrap();
    }

    let outcome = engine.submit_trend("alice", payload(0.6)).unwrap();
    let reward = outcome.reward.unwrap();
    assert_eq!(reward.delta, 10);
    assert!(reward.capped);

    let summary = engine.user_xp_summary("alice").unwrap();
    // 4990 + clamped 10 + nothing from the capped first_trend achievement
    assert_eq!(summary.total_xp, 5000);
}

#[test]
fn vote_reward_earns_voter_xp() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();
    let trend_id = engine.submit_trend("alice", payload(0.5)).unwrap().trend_id;

    let outcome = engine.cast_vote(&trend_id, "bob", VoteValue::Unsure).unwrap();
    let reward = outcome.reward.unwrap();
    // Base vote reward at level 1, no streaks: 5
    assert_eq!(reward.delta, 5);

    // Vote reward plus the first_validation achievement (flat 50)
    let summary = engine.user_xp_summary("bob").unwrap();
    assert_eq!(summary.total_xp, 55);
}

#[test]
fn reconciler_drains_entries_enqueued_out_of_band() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let engine = TrendEngine::open(&db_path, plain_config()).unwrap();

    // Simulate a submission that was durably enqueued but never
    // processed (e.g. the process died between the two steps)
    {
        let raw = TrendStore::open_at(&db_path).unwrap();
        pulsed::outbox::enqueue(
            raw.conn(),
            "orphan-trend",
            "alice",
            &payload(0.95),
            chrono::Utc::now(),
        )
        .unwrap();
    }

    assert_eq!(engine.run_reconciler_once().unwrap(), 1);

    let trend = engine.get_trend("orphan-trend").unwrap();
    assert_eq!(trend.status, TrendStatus::Pending);
    assert_eq!(trend.submitter_id, "alice");
    // The submission reward and first_trend achievement were paid
    assert_eq!(engine.user_xp_summary("alice").unwrap().total_xp, 175);

    // A second pass finds nothing left
    assert_eq!(engine.run_reconciler_once().unwrap(), 0);
}

#[test]
fn summary_reports_streak_counters() {
    let engine = TrendEngine::open_in_memory(plain_config()).unwrap();

    engine.submit_trend("alice", payload(0.5)).unwrap();
    engine.submit_trend("alice", payload(0.5)).unwrap();
    engine.submit_trend("alice", payload(0.5)).unwrap();

    let summary = engine.user_xp_summary("alice").unwrap();
    assert_eq!(summary.session_streak, 3);
    assert_eq!(summary.daily_streak, 0);
}
