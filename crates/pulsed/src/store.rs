//! SQLite-backed engine store.
//!
//! Schema:
//! - trends: one row per submission, tally columns updated with votes
//! - votes: one row per (trend, voter), immutable
//! - xp_ledger: append-only signed deltas, sole source of truth for XP
//! - streaks: per-user session/daily streak state
//! - achievements: unlocked milestones, unique per (user, achievement)
//! - intake_outbox: durable submission queue for the reconciler
//!
//! Helper functions take `&Connection` so they compose inside the
//! engine's transactions (rusqlite's `Transaction` derefs to it).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use pulse_common::error::EngineError;
use pulse_common::streaks::StreakState;
use pulse_common::taxonomy::{Category, Platform};
use pulse_common::trend::{TrendStatus, TrendSubmission, ValidationVote, VoteTally, VoteValue};
use pulse_common::{TrendId, UserId};

/// Engine store handle, one open connection in WAL mode
pub struct TrendStore {
    conn: Connection,
}

impl TrendStore {
    /// Open or create the store at a path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn init_schema(conn: &Connection) -> Result<(), EngineError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trends (
                id TEXT PRIMARY KEY,
                submitter_id TEXT NOT NULL,
                category TEXT NOT NULL,
                platform TEXT NOT NULL,
                quality_score REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                yes_votes INTEGER NOT NULL DEFAULT 0,
                no_votes INTEGER NOT NULL DEFAULT 0,
                unsure_votes INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                resolved_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_trends_status_created
                ON trends(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_trends_submitter
                ON trends(submitter_id);

            CREATE TABLE IF NOT EXISTS votes (
                trend_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                vote TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (trend_id, voter_id)
            );

            CREATE INDEX IF NOT EXISTS idx_votes_voter ON votes(voter_id);

            CREATE TABLE IF NOT EXISTS xp_ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                xp_delta INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                metadata TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_user_time
                ON xp_ledger(user_id, created_at);

            CREATE TABLE IF NOT EXISTS streaks (
                user_id TEXT PRIMARY KEY,
                session_streak INTEGER NOT NULL DEFAULT 0,
                session_last_at INTEGER,
                daily_streak INTEGER NOT NULL DEFAULT 0,
                daily_last_date TEXT
            );

            CREATE TABLE IF NOT EXISTS achievements (
                user_id TEXT NOT NULL,
                achievement TEXT NOT NULL,
                unlocked_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, achievement)
            );

            CREATE TABLE IF NOT EXISTS intake_outbox (
                trend_id TEXT PRIMARY KEY,
                submitter_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                attempts INTEGER NOT NULL DEFAULT 0,
                next_attempt_at INTEGER NOT NULL,
                last_error TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_outbox_status_due
                ON intake_outbox(status, next_attempt_at);
            "#,
        )?;
        Ok(())
    }
}

fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

fn row_to_trend(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTrendRow> {
    Ok(RawTrendRow {
        id: row.get(0)?,
        submitter_id: row.get(1)?,
        category: row.get(2)?,
        platform: row.get(3)?,
        quality_score: row.get(4)?,
        status: row.get(5)?,
        yes: row.get(6)?,
        no: row.get(7)?,
        unsure: row.get(8)?,
        created_at: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}

struct RawTrendRow {
    id: String,
    submitter_id: String,
    category: String,
    platform: String,
    quality_score: f64,
    status: String,
    yes: u32,
    no: u32,
    unsure: u32,
    created_at: i64,
    resolved_at: Option<i64>,
}

impl RawTrendRow {
    fn into_trend(self) -> Result<TrendSubmission, EngineError> {
        Ok(TrendSubmission {
            category: Category::parse(&self.category)?,
            platform: Platform::parse(&self.platform)?,
            status: TrendStatus::parse(&self.status)
                .ok_or_else(|| EngineError::TrendNotFound(self.id.clone()))?,
            id: self.id,
            submitter_id: self.submitter_id,
            quality_score: self.quality_score,
            tally: VoteTally {
                yes: self.yes,
                no: self.no,
                unsure: self.unsure,
            },
            created_at: ts_to_datetime(self.created_at),
            resolved_at: self.resolved_at.map(ts_to_datetime),
        })
    }
}

const TREND_COLUMNS: &str = "id, submitter_id, category, platform, quality_score, status, \
     yes_votes, no_votes, unsure_votes, created_at, resolved_at";

// ============================================================================
// Trends
// ============================================================================

pub fn insert_trend(conn: &Connection, trend: &TrendSubmission) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO trends (id, submitter_id, category, platform, quality_score, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            trend.id,
            trend.submitter_id,
            trend.category.as_str(),
            trend.platform.as_str(),
            trend.quality_score,
            trend.status.as_str(),
            trend.created_at.timestamp(),
        ],
    )?;
    Ok(())
}

pub fn get_trend(conn: &Connection, trend_id: &str) -> Result<Option<TrendSubmission>, EngineError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM trends WHERE id = ?1", TREND_COLUMNS),
            params![trend_id],
            row_to_trend,
        )
        .optional()?;
    row.map(RawTrendRow::into_trend).transpose()
}

pub fn trend_exists(conn: &Connection, trend_id: &str) -> Result<bool, EngineError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM trends WHERE id = ?1)",
        params![trend_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Compare-and-swap the trend into a terminal status. Returns false when
/// another writer resolved it first (the transition is skipped).
pub fn cas_resolve(
    conn: &Connection,
    trend_id: &str,
    status: TrendStatus,
    resolved_at: DateTime<Utc>,
) -> Result<bool, EngineError> {
    let changed = conn.execute(
        "UPDATE trends SET status = ?1, resolved_at = ?2 WHERE id = ?3 AND status = 'pending'",
        params![status.as_str(), resolved_at.timestamp(), trend_id],
    )?;
    Ok(changed == 1)
}

/// Ids of PENDING trends created at or before the cutoff
pub fn pending_created_before(
    conn: &Connection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<TrendId>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM trends WHERE status = 'pending' AND created_at <= ?1 ORDER BY created_at",
    )?;
    let ids = stmt
        .query_map(params![cutoff.timestamp()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn trends_submitted_count(conn: &Connection, user_id: &str) -> Result<u64, EngineError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trends WHERE submitter_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

// ============================================================================
// Votes
// ============================================================================

pub fn has_voted(conn: &Connection, trend_id: &str, voter_id: &str) -> Result<bool, EngineError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM votes WHERE trend_id = ?1 AND voter_id = ?2)",
        params![trend_id, voter_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn insert_vote(conn: &Connection, vote: &ValidationVote) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO votes (trend_id, voter_id, vote, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            vote.trend_id,
            vote.voter_id,
            vote.vote.as_str(),
            vote.created_at.timestamp(),
        ],
    )?;
    let column = match vote.vote {
        VoteValue::Yes => "yes_votes",
        VoteValue::No => "no_votes",
        VoteValue::Unsure => "unsure_votes",
    };
    conn.execute(
        &format!("UPDATE trends SET {} = {} + 1 WHERE id = ?1", column, column),
        params![vote.trend_id],
    )?;
    Ok(())
}

/// Voters whose vote matched the given value, in vote order
pub fn voters_for_value(
    conn: &Connection,
    trend_id: &str,
    value: VoteValue,
) -> Result<Vec<UserId>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT voter_id FROM votes WHERE trend_id = ?1 AND vote = ?2 ORDER BY created_at",
    )?;
    let voters = stmt
        .query_map(params![trend_id, value.as_str()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(voters)
}

pub fn votes_cast_count(conn: &Connection, user_id: &str) -> Result<u64, EngineError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE voter_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

// ============================================================================
// XP ledger
// ============================================================================

pub fn append_ledger(
    conn: &Connection,
    user_id: &str,
    event_type: &str,
    xp_delta: i64,
    created_at: DateTime<Utc>,
    metadata: Option<&serde_json::Value>,
) -> Result<(), EngineError> {
    let metadata_text = metadata.map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO xp_ledger (user_id, event_type, xp_delta, created_at, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            event_type,
            xp_delta,
            created_at.timestamp(),
            metadata_text,
        ],
    )?;
    Ok(())
}

/// Total XP by full re-aggregation of the ledger
pub fn total_xp(conn: &Connection, user_id: &str) -> Result<i64, EngineError> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(xp_delta), 0) FROM xp_ledger WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Sum of positive deltas awarded since the given instant (start of the
/// current UTC day for cap checks)
pub fn positive_xp_since(
    conn: &Connection,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<i64, EngineError> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(xp_delta), 0) FROM xp_ledger
         WHERE user_id = ?1 AND xp_delta > 0 AND created_at >= ?2",
        params![user_id, since.timestamp()],
        |row| row.get(0),
    )?;
    Ok(total)
}

// ============================================================================
// Streaks
// ============================================================================

pub fn get_streak(conn: &Connection, user_id: &str) -> Result<StreakState, EngineError> {
    let row = conn
        .query_row(
            "SELECT session_streak, session_last_at, daily_streak, daily_last_date
             FROM streaks WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((session, session_last_at, daily, daily_last_date)) => Ok(StreakState {
            user_id: user_id.to_string(),
            session_streak_count: session,
            session_last_event_at: session_last_at.map(ts_to_datetime),
            daily_streak_count: daily,
            daily_last_event_date: daily_last_date
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        }),
        None => Ok(StreakState::new(user_id.to_string())),
    }
}

pub fn upsert_streak(conn: &Connection, state: &StreakState) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO streaks (user_id, session_streak, session_last_at, daily_streak, daily_last_date)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
             session_streak = excluded.session_streak,
             session_last_at = excluded.session_last_at,
             daily_streak = excluded.daily_streak,
             daily_last_date = excluded.daily_last_date",
        params![
            state.user_id,
            state.session_streak_count,
            state.session_last_event_at.map(|t| t.timestamp()),
            state.daily_streak_count,
            state
                .daily_last_event_date
                .map(|d| d.format("%Y-%m-%d").to_string()),
        ],
    )?;
    Ok(())
}

// ============================================================================
// Achievements
// ============================================================================

/// Record an unlock; returns false when the user already has it.
pub fn try_unlock_achievement(
    conn: &Connection,
    user_id: &str,
    achievement_id: &str,
    unlocked_at: DateTime<Utc>,
) -> Result<bool, EngineError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO achievements (user_id, achievement, unlocked_at)
         VALUES (?1, ?2, ?3)",
        params![user_id, achievement_id, unlocked_at.timestamp()],
    )?;
    Ok(changed == 1)
}
