//! Level Engine
//!
//! Table-driven mapping from cumulative XP to level, title, and reward
//! multiplier. 15 levels with a cultural-anthropologist theme; thresholds
//! strictly increasing, multipliers non-decreasing.

use serde::{Deserialize, Serialize};

/// One row of the static level table: (level, title, xp_threshold, multiplier)
pub const LEVEL_TABLE: &[(u8, &str, i64, f64)] = &[
    (1, "Observer", 0, 1.0),
    (2, "Recorder", 100, 1.1),
    (3, "Tracker", 300, 1.2),
    (4, "Spotter", 600, 1.3),
    (5, "Analyst", 1000, 1.4),
    (6, "Interpreter", 1500, 1.5),
    (7, "Specialist", 2200, 1.6),
    (8, "Expert", 3000, 1.7),
    (9, "Scholar", 4000, 1.8),
    (10, "Researcher", 5200, 2.0),
    (11, "Authority", 6600, 2.2),
    (12, "Pioneer", 8200, 2.4),
    (13, "Visionary", 10000, 2.6),
    (14, "Master", 12500, 2.8),
    (15, "Legend", 15000, 3.0),
];

/// Resolved level information for a given XP total
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelInfo {
    pub level: u8,
    pub title: &'static str,
    pub threshold: i64,
    pub multiplier: f64,
}

/// Map a cumulative XP total to its level.
///
/// Returns the row with the greatest threshold <= total_xp. Callers clamp
/// negative totals to zero before lookup; this function does the same so a
/// penalty-heavy ledger still resolves to level 1.
pub fn level_for(total_xp: i64) -> LevelInfo {
    let total_xp = total_xp.max(0);
    let mut current = LEVEL_TABLE[0];
    for row in LEVEL_TABLE {
        if total_xp >= row.2 {
            current = *row;
        } else {
            break;
        }
    }
    LevelInfo {
        level: current.0,
        title: current.1,
        threshold: current.2,
        multiplier: current.3,
    }
}

/// Progress toward the next level for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// XP accumulated past the current level threshold
    pub xp_into_level: i64,
    /// XP between the current and next thresholds (0 at max level)
    pub xp_for_next: i64,
    /// Percentage toward the next level, 0-100 (100 at max level)
    pub percent: u8,
}

pub fn progress_for(total_xp: i64) -> LevelProgress {
    let total_xp = total_xp.max(0);
    let current = level_for(total_xp);
    let next = LEVEL_TABLE
        .iter()
        .find(|row| row.2 > current.threshold)
        .copied();

    match next {
        Some((_, _, next_threshold, _)) => {
            let xp_into_level = total_xp - current.threshold;
            let xp_for_next = next_threshold - current.threshold;
            let percent = ((xp_into_level * 100) / xp_for_next).clamp(0, 100) as u8;
            LevelProgress {
                xp_into_level,
                xp_for_next,
                percent,
            }
        }
        None => LevelProgress {
            xp_into_level: total_xp - current.threshold,
            xp_for_next: 0,
            percent: 100,
        },
    }
}
