//! Durable submission outbox.
//!
//! Submissions are enqueued with a single idempotent write (INSERT OR
//! IGNORE keyed by trend id) and drained by the reconciler. A transient
//! processing failure leaves the entry queued with backoff; exhausting
//! the attempt budget marks it dead for operator attention. This
//! replaces cascading ad-hoc fallback writes with one write path.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::warn;

use pulse_common::error::EngineError;
use pulse_common::trend::SubmitPayload;
use pulse_common::{TrendId, UserId};

/// Retry backoff per attempt, in seconds
const RETRY_DELAYS_SECS: &[i64] = &[1, 3, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Queued,
    Done,
    Dead,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Queued => "queued",
            OutboxStatus::Done => "done",
            OutboxStatus::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(OutboxStatus::Queued),
            "done" => Some(OutboxStatus::Done),
            "dead" => Some(OutboxStatus::Dead),
            _ => None,
        }
    }
}

/// One queued submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub trend_id: TrendId,
    pub submitter_id: UserId,
    pub payload: SubmitPayload,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Idempotent enqueue. Returns false when the trend id is already queued
/// (a replay), making resubmission a no-op.
pub fn enqueue(
    conn: &Connection,
    trend_id: &str,
    submitter_id: &str,
    payload: &SubmitPayload,
    now: DateTime<Utc>,
) -> Result<bool, EngineError> {
    let payload_json = serde_json::to_string(payload)?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO intake_outbox
             (trend_id, submitter_id, payload, status, attempts, next_attempt_at, created_at)
         VALUES (?1, ?2, ?3, 'queued', 0, ?4, ?4)",
        params![trend_id, submitter_id, payload_json, now.timestamp()],
    )?;
    Ok(changed == 1)
}

pub fn get_entry(conn: &Connection, trend_id: &str) -> Result<Option<OutboxEntry>, EngineError> {
    let row = conn
        .query_row(
            "SELECT trend_id, submitter_id, payload, status, attempts, next_attempt_at,
                    last_error, created_at
             FROM intake_outbox WHERE trend_id = ?1",
            params![trend_id],
            row_to_entry,
        )
        .optional()?;
    row.map(raw_into_entry).transpose()
}

/// Queued entries due for processing, oldest first
pub fn due_entries(
    conn: &Connection,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<OutboxEntry>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT trend_id, submitter_id, payload, status, attempts, next_attempt_at,
                last_error, created_at
         FROM intake_outbox
         WHERE status = 'queued' AND next_attempt_at <= ?1
         ORDER BY created_at LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![now.timestamp(), limit as i64], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(raw_into_entry).collect()
}

/// All entries not yet done, for the queue status view
pub fn backlog(conn: &Connection) -> Result<Vec<OutboxEntry>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT trend_id, submitter_id, payload, status, attempts, next_attempt_at,
                last_error, created_at
         FROM intake_outbox WHERE status != 'done' ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map([], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(raw_into_entry).collect()
}

pub fn mark_done(conn: &Connection, trend_id: &str) -> Result<(), EngineError> {
    conn.execute(
        "UPDATE intake_outbox SET status = 'done', last_error = NULL WHERE trend_id = ?1",
        params![trend_id],
    )?;
    Ok(())
}

/// Record a failed attempt. Applies backoff, or marks the entry dead
/// once the attempt budget is spent.
pub fn mark_failed(
    conn: &Connection,
    trend_id: &str,
    error: &str,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<OutboxStatus, EngineError> {
    let attempts: u32 = conn.query_row(
        "SELECT attempts FROM intake_outbox WHERE trend_id = ?1",
        params![trend_id],
        |row| row.get(0),
    )?;
    let attempts = attempts + 1;

    let status = if attempts >= max_attempts {
        warn!(trend = trend_id, attempts, error, "outbox entry dead");
        OutboxStatus::Dead
    } else {
        OutboxStatus::Queued
    };
    let delay = RETRY_DELAYS_SECS
        .get(attempts.saturating_sub(1) as usize)
        .copied()
        .unwrap_or(*RETRY_DELAYS_SECS.last().unwrap_or(&5));
    let next_attempt = now + Duration::seconds(delay);

    conn.execute(
        "UPDATE intake_outbox
         SET status = ?1, attempts = ?2, next_attempt_at = ?3, last_error = ?4
         WHERE trend_id = ?5",
        params![
            status.as_str(),
            attempts,
            next_attempt.timestamp(),
            error,
            trend_id,
        ],
    )?;
    Ok(status)
}

struct RawEntry {
    trend_id: String,
    submitter_id: String,
    payload: String,
    status: String,
    attempts: u32,
    next_attempt_at: i64,
    last_error: Option<String>,
    created_at: i64,
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        trend_id: row.get(0)?,
        submitter_id: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        next_attempt_at: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn raw_into_entry(raw: RawEntry) -> Result<OutboxEntry, EngineError> {
    let payload: SubmitPayload = serde_json::from_str(&raw.payload)?;
    Ok(OutboxEntry {
        payload,
        status: OutboxStatus::parse(&raw.status).unwrap_or(OutboxStatus::Dead),
        trend_id: raw.trend_id,
        submitter_id: raw.submitter_id,
        attempts: raw.attempts,
        next_attempt_at: ts(raw.next_attempt_at),
        last_error: raw.last_error,
        created_at: ts(raw.created_at),
    })
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
