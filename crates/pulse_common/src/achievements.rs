//! Milestone achievements.
//!
//! Flat XP awards for submission counts, validation counts, and daily
//! streak milestones. Each unlocks at most once per user; the engine
//! records unlocks in the store and appends the award to the ledger.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstTrend,
    TenthTrend,
    FiftiethTrend,
    HundredthTrend,
    FirstValidation,
    PerfectWeek,
    PerfectFortnight,
    PerfectMonth,
}

impl Achievement {
    pub const ALL: &'static [Achievement] = &[
        Achievement::FirstTrend,
        Achievement::TenthTrend,
        Achievement::FiftiethTrend,
        Achievement::HundredthTrend,
        Achievement::FirstValidation,
        Achievement::PerfectWeek,
        Achievement::PerfectFortnight,
        Achievement::PerfectMonth,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Achievement::FirstTrend => "first_trend",
            Achievement::TenthTrend => "tenth_trend",
            Achievement::FiftiethTrend => "fiftieth_trend",
            Achievement::HundredthTrend => "hundredth_trend",
            Achievement::FirstValidation => "first_validation",
            Achievement::PerfectWeek => "perfect_week",
            Achievement::PerfectFortnight => "perfect_fortnight",
            Achievement::PerfectMonth => "perfect_month",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Achievement::FirstTrend => "First Sighting",
            Achievement::TenthTrend => "Pattern Spotter",
            Achievement::FiftiethTrend => "Field Researcher",
            Achievement::HundredthTrend => "Trend Cartographer",
            Achievement::FirstValidation => "Second Opinion",
            Achievement::PerfectWeek => "Perfect Week",
            Achievement::PerfectFortnight => "Perfect Fortnight",
            Achievement::PerfectMonth => "Perfect Month",
        }
    }

    /// Flat XP awarded at unlock
    pub fn xp_reward(&self) -> i64 {
        match self {
            Achievement::FirstTrend => 100,
            Achievement::TenthTrend => 250,
            Achievement::FiftiethTrend => 500,
            Achievement::HundredthTrend => 1000,
            Achievement::FirstValidation => 50,
            Achievement::PerfectWeek => 500,
            Achievement::PerfectFortnight => 1000,
            Achievement::PerfectMonth => 2000,
        }
    }
}

impl std::fmt::Display for Achievement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Counters an unlock check runs against
#[derive(Debug, Clone, Copy, Default)]
pub struct MilestoneCounters {
    pub trends_submitted: u64,
    pub votes_cast: u64,
    pub daily_streak: u32,
}

/// Achievements whose conditions the counters now satisfy. The engine
/// filters out ones already unlocked.
pub fn satisfied(counters: &MilestoneCounters) -> Vec<Achievement> {
    Achievement::ALL
        .iter()
        .copied()
        .filter(|a| is_satisfied(*a, counters))
        .collect()
}

fn is_satisfied(achievement: Achievement, counters: &MilestoneCounters) -> bool {
    match achievement {
        Achievement::FirstTrend => counters.trends_submitted >= 1,
        Achievement::TenthTrend => counters.trends_submitted >= 10,
        Achievement::FiftiethTrend => counters.trends_submitted >= 50,
        Achievement::HundredthTrend => counters.trends_submitted >= 100,
        Achievement::FirstValidation => counters.votes_cast >= 1,
        Achievement::PerfectWeek => counters.daily_streak >= 7,
        Achievement::PerfectFortnight => counters.daily_streak >= 14,
        Achievement::PerfectMonth => counters.daily_streak >= 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trend_satisfied() {
        let counters = MilestoneCounters {
            trends_submitted: 1,
            ..Default::default()
        };
        let unlocked = satisfied(&counters);
        assert_eq!(unlocked, vec![Achievement::FirstTrend]);
    }

    #[test]
    fn test_streak_milestones() {
        let counters = MilestoneCounters {
            daily_streak: 14,
            ..Default::default()
        };
        let unlocked = satisfied(&counters);
        assert!(unlocked.contains(&Achievement::PerfectWeek));
        assert!(unlocked.contains(&Achievement::PerfectFortnight));
        assert!(!unlocked.contains(&Achievement::PerfectMonth));
    }

    #[test]
    fn test_counts_accumulate() {
        let counters = MilestoneCounters {
            trends_submitted: 50,
            votes_cast: 3,
            daily_streak: 0,
        };
        let unlocked = satisfied(&counters);
        assert!(unlocked.contains(&Achievement::FirstTrend));
        assert!(unlocked.contains(&Achievement::TenthTrend));
        assert!(unlocked.contains(&Achievement::FiftiethTrend));
        assert!(unlocked.contains(&Achievement::FirstValidation));
        assert!(!unlocked.contains(&Achievement::HundredthTrend));
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<_> = Achievement::ALL.iter().map(|a| a.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), Achievement::ALL.len());
    }
}
