//! Engine facade.
//!
//! Owns the store behind a mutex and wraps every operation in a single
//! transaction with bounded retry on transient storage conflicts. This
//! is the only public surface the surrounding application calls.

use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pulse_common::config::EngineConfig;
use pulse_common::error::EngineError;
use pulse_common::ledger::XpSummary;
use pulse_common::progression::{level_for, progress_for};
use pulse_common::trend::{SubmitPayload, TrendStatus, TrendSubmission, VoteValue};

use crate::ballot::{self, Resolution, VoteOutcome};
use crate::intake::{self, SubmitOutcome};
use crate::outbox::{self, OutboxEntry};
use crate::store::{self, TrendStore};

pub struct TrendEngine {
    store: Mutex<TrendStore>,
    config: EngineConfig,
}

impl TrendEngine {
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            store: Mutex::new(TrendStore::open_at(path)?),
            config,
        })
    }

    pub fn open_in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            store: Mutex::new(TrendStore::open_in_memory()?),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `op` inside a transaction, retrying transient conflicts with
    /// fresh reads. Everything the closure wrote commits atomically or
    /// not at all.
    fn transact<T>(
        &self,
        mut op: impl FnMut(&Connection) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let store = self.store.lock().expect("engine store mutex poisoned");
        let mut attempt = 0;
        loop {
            let result = store
                .conn()
                .unchecked_transaction()
                .map_err(EngineError::from)
                .and_then(|tx| {
                    let value = op(&tx)?;
                    tx.commit()?;
                    Ok(value)
                });

            match result {
                Err(err) if err.is_transient() && attempt < self.config.conflict_retries => {
                    attempt += 1;
                    debug!(attempt, "transient storage conflict, retrying");
                }
                Err(err) if err.is_transient() => {
                    return Err(EngineError::ConflictRetriesExhausted(
                        self.config.conflict_retries,
                    ));
                }
                other => return other,
            }
        }
    }

    /// Create a trend in PENDING state and award the submission reward.
    ///
    /// The payload is durably enqueued first; intake then runs
    /// synchronously. If intake keeps hitting transient conflicts the
    /// entry stays queued and the background reconciler finishes it.
    pub fn submit_trend(
        &self,
        submitter_id: &str,
        payload: SubmitPayload,
    ) -> Result<SubmitOutcome, EngineError> {
        let trend_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        self.transact(|conn| {
            outbox::enqueue(conn, &trend_id, submitter_id, &payload, now)?;
            Ok(())
        })?;

        let processed = self.transact(|conn| {
            let entry = outbox::get_entry(conn, &trend_id)?
                .ok_or_else(|| EngineError::TrendNotFound(trend_id.clone()))?;
            intake::process_entry_tx(conn, &self.config, &entry, now)
        });

        match processed {
            Ok(Some(done)) => {
                info!(
                    trend = %trend_id,
                    user = submitter_id,
                    xp = done.reward.delta,
                    "trend submitted"
                );
                Ok(SubmitOutcome {
                    trend_id,
                    status: TrendStatus::Pending,
                    reward: Some(done.reward),
                    level_change: done.level_change,
                    queued: false,
                })
            }
            // A replay that found the trend already created
            Ok(None) => Ok(SubmitOutcome {
                trend_id,
                status: TrendStatus::Pending,
                reward: None,
                level_change: None,
                queued: false,
            }),
            Err(err) if matches!(err, EngineError::ConflictRetriesExhausted(_)) => {
                warn!(trend = %trend_id, "intake deferred to reconciler: {}", err);
                let _ = self.transact(|conn| {
                    outbox::mark_failed(
                        conn,
                        &trend_id,
                        &err.to_string(),
                        self.config.outbox_max_attempts,
                        now,
                    )
                });
                Ok(SubmitOutcome {
                    trend_id: trend_id.clone(),
                    status: TrendStatus::Pending,
                    reward: None,
                    level_change: None,
                    queued: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Cast one vote; resolves the trend when consensus is reached.
    pub fn cast_vote(
        &self,
        trend_id: &str,
        voter_id: &str,
        vote: VoteValue,
    ) -> Result<VoteOutcome, EngineError> {
        let now = Utc::now();
        self.transact(|conn| ballot::cast_vote_tx(conn, &self.config, trend_id, voter_id, vote, now))
    }

    /// Scheduler entry point: force-resolve a PENDING trend past the
    /// voting window. No-op (None) before the window elapses.
    pub fn resolve_or_expire(&self, trend_id: &str) -> Result<Option<Resolution>, EngineError> {
        let now = Utc::now();
        self.transact(|conn| ballot::resolve_or_expire_tx(conn, &self.config, trend_id, now))
    }

    /// Resolve every PENDING trend whose voting window has elapsed.
    pub fn sweep_expired(&self) -> Result<usize, EngineError> {
        let now = Utc::now();
        let cutoff = now - self.config.voting_window();
        let stale = self.transact(|conn| store::pending_created_before(conn, cutoff))?;

        let mut resolved = 0;
        for trend_id in stale {
            let result = self.transact(|conn| {
                ballot::resolve_or_expire_tx(conn, &self.config, &trend_id, now)
            })?;
            if result.is_some() {
                resolved += 1;
            }
        }
        if resolved > 0 {
            info!(resolved, "expiry sweep resolved stale trends");
        }
        Ok(resolved)
    }

    /// Drain due outbox entries. Returns the number processed.
    pub fn run_reconciler_once(&self) -> Result<usize, EngineError> {
        let now = Utc::now();
        let due = self.transact(|conn| outbox::due_entries(conn, now, 100))?;

        let mut processed = 0;
        for entry in due {
            let result = self.transact(|conn| {
                intake::process_entry_tx(conn, &self.config, &entry, Utc::now())
            });
            match result {
                Ok(done) => {
                    if done.is_some() {
                        processed += 1;
                    }
                }
                Err(err) => {
                    warn!(trend = %entry.trend_id, "reconciler attempt failed: {}", err);
                    self.transact(|conn| {
                        outbox::mark_failed(
                            conn,
                            &entry.trend_id,
                            &err.to_string(),
                            self.config.outbox_max_attempts,
                            now,
                        )
                    })?;
                }
            }
        }
        if processed > 0 {
            info!(processed, "reconciler drained queued submissions");
        }
        Ok(processed)
    }

    /// Per-user XP summary, recomputed from the ledger.
    pub fn user_xp_summary(&self, user_id: &str) -> Result<XpSummary, EngineError> {
        self.transact(|conn| {
            let total = store::total_xp(conn, user_id)?;
            let level = level_for(total);
            let progress = progress_for(total);
            let streaks = store::get_streak(conn, user_id)?;
            Ok(XpSummary::from_parts(
                user_id.to_string(),
                total,
                level,
                progress,
                streaks.session_streak_count,
                streaks.daily_streak_count,
            ))
        })
    }

    pub fn get_trend(&self, trend_id: &str) -> Result<TrendSubmission, EngineError> {
        self.transact(|conn| {
            store::get_trend(conn, trend_id)?
                .ok_or_else(|| EngineError::TrendNotFound(trend_id.to_string()))
        })
    }

    /// Outbox entries not yet done, for operational visibility.
    pub fn outbox_backlog(&self) -> Result<Vec<OutboxEntry>, EngineError> {
        self.transact(outbox::backlog)
    }
}
