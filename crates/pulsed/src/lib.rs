//! Pulsed - Trend validation and reward engine.
//!
//! Owns the SQLite store and exposes the engine operations: submission
//! intake (through a durable outbox), vote casting with consensus
//! resolution, the expiry sweep, and XP summaries. All XP-affecting
//! operations are single transactions; the derived XP total is always
//! recomputed from the ledger, never cached across transactions.

pub mod achieve;
pub mod ballot;
pub mod engine;
pub mod intake;
pub mod outbox;
pub mod rewards;
pub mod store;
pub mod streaks;

pub use engine::TrendEngine;
