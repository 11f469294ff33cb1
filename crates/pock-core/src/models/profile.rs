//! Per-user reading statistics and goals

use serde::{Deserialize, Serialize};

/// Aggregate reading statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingStats {
    pub total_books_read: u32,
    /// Total reading time in minutes
    pub total_reading_time: u64,
    /// Consecutive reading days
    pub reading_streak: u32,
    /// Unix ms
    pub last_read_date: i64,
}

impl ReadingStats {
    /// Fresh stats for a new user
    #[must_use]
    pub const fn starting_at(now_ms: i64) -> Self {
        Self {
            total_books_read: 0,
            total_reading_time: 0,
            reading_streak: 0,
            last_read_date: now_ms,
        }
    }
}

/// Reading targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingGoals {
    /// Minutes per day
    pub daily: u32,
    /// Minutes per week
    pub weekly: u32,
    pub pages_per_day: u32,
    pub books_per_month: u32,
    /// Unix ms
    pub start_date: i64,
    /// Unix ms
    pub last_updated: i64,
}

impl ReadingGoals {
    /// Default goals for a new user
    #[must_use]
    pub const fn starting_at(now_ms: i64) -> Self {
        Self {
            daily: 30,
            weekly: 210,
            pages_per_day: 20,
            books_per_month: 2,
            start_date: now_ms,
            last_updated: now_ms,
        }
    }
}
