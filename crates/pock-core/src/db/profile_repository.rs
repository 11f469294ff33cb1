//! Per-user reading stats and goals

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{ReadingGoals, ReadingStats};

/// Reading stats and goals for signed-in users
pub struct ProfileRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Write default stats and goals for a user that has none yet.
    ///
    /// Returns `true` when anything was created.
    pub async fn initialize(&self, user_id: &str) -> Result<bool> {
        let now = crate::util::unix_millis_now();
        let stats = ReadingStats::starting_at(now);
        let goals = ReadingGoals::starting_at(now);

        let created_stats = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO reading_stats
                    (user_id, total_books_read, total_reading_time, reading_streak, last_read_date)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    user_id,
                    i64::from(stats.total_books_read),
                    i64::try_from(stats.total_reading_time).unwrap_or(i64::MAX),
                    i64::from(stats.reading_streak),
                    stats.last_read_date
                ],
            )
            .await?;

        let created_goals = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO reading_goals
                    (user_id, daily, weekly, pages_per_day, books_per_month, start_date, last_updated)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    user_id,
                    i64::from(goals.daily),
                    i64::from(goals.weekly),
                    i64::from(goals.pages_per_day),
                    i64::from(goals.books_per_month),
                    goals.start_date,
                    goals.last_updated
                ],
            )
            .await?;

        let created = created_stats + created_goals > 0;
        if created {
            tracing::info!(user_id, "Initialized reading profile");
        }
        Ok(created)
    }

    /// Reading stats for a user
    pub async fn stats(&self, user_id: &str) -> Result<Option<ReadingStats>> {
        let mut rows = self
            .conn
            .query(
                "SELECT total_books_read, total_reading_time, reading_streak, last_read_date
                 FROM reading_stats WHERE user_id = ?",
                params![user_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(ReadingStats {
                total_books_read: to_u32(row.get::<i64>(0)?),
                total_reading_time: u64::try_from(row.get::<i64>(1)?).unwrap_or_default(),
                reading_streak: to_u32(row.get::<i64>(2)?),
                last_read_date: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    /// Reading goals for a user
    pub async fn goals(&self, user_id: &str) -> Result<Option<ReadingGoals>> {
        let mut rows = self
            .conn
            .query(
                "SELECT daily, weekly, pages_per_day, books_per_month, start_date, last_updated
                 FROM reading_goals WHERE user_id = ?",
                params![user_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(ReadingGoals {
                daily: to_u32(row.get::<i64>(0)?),
                weekly: to_u32(row.get::<i64>(1)?),
                pages_per_day: to_u32(row.get::<i64>(2)?),
                books_per_month: to_u32(row.get::<i64>(3)?),
                start_date: row.get(4)?,
                last_updated: row.get(5)?,
            })),
            None => Ok(None),
        }
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}
