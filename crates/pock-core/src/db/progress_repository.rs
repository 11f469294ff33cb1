//! Reading progress repository implementation

use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{ProgressUpdate, ReadingProgress};

/// Trait for reading progress storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ProgressRepository {
    /// Merge an update into the stored progress and return the result
    async fn save(
        &self,
        user_id: &str,
        book_id: &str,
        update: &ProgressUpdate,
    ) -> Result<ReadingProgress>;

    /// Get the stored progress for a book
    async fn get(&self, user_id: &str, book_id: &str) -> Result<Option<ReadingProgress>>;
}

/// libSQL implementation of `ProgressRepository`
pub struct LibSqlProgressRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlProgressRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ProgressRepository for LibSqlProgressRepository<'_> {
    async fn save(
        &self,
        user_id: &str,
        book_id: &str,
        update: &ProgressUpdate,
    ) -> Result<ReadingProgress> {
        if let Some(percentage) = update.percentage {
            if !(0.0..=1.0).contains(&percentage) {
                return Err(Error::InvalidInput(format!(
                    "Percentage must be between 0 and 1, got {percentage}"
                )));
            }
        }
        let location = crate::util::normalize_text_option(update.location.clone());
        let now = crate::util::unix_millis_now();

        // COALESCE keeps the stored value for fields missing from the update
        self.conn
            .execute(
                "INSERT INTO reading_progress (user_id, book_id, location, percentage, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, book_id) DO UPDATE SET
                    location = COALESCE(excluded.location, reading_progress.location),
                    percentage = COALESCE(excluded.percentage, reading_progress.percentage),
                    last_updated = excluded.last_updated",
                params![user_id, book_id, location, update.percentage, now],
            )
            .await?;

        tracing::debug!(user_id, book_id, "Saved reading progress");
        self.get(user_id, book_id)
            .await?
            .ok_or_else(|| Error::NotFound(book_id.to_string()))
    }

    async fn get(&self, user_id: &str, book_id: &str) -> Result<Option<ReadingProgress>> {
        let mut rows = self
            .conn
            .query(
                "SELECT book_id, location, percentage, last_updated
                 FROM reading_progress WHERE user_id = ? AND book_id = ?",
                params![user_id, book_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(ReadingProgress {
                book_id: row.get(0)?,
                location: row.get(1)?,
                percentage: row.get(2)?,
                last_updated: row.get(3)?,
            })),
            None => Ok(None),
        }
    }
}
