//! Reading progress model

use serde::{Deserialize, Serialize};

/// Where a reader left off in one book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    /// Book item id
    pub book_id: String,
    /// Reader location (EPUB CFI or PDF page label)
    pub location: Option<String>,
    /// Fraction of the book read, in `[0, 1]`
    pub percentage: Option<f64>,
    /// Last save timestamp (Unix ms)
    pub last_updated: i64,
}

/// Partial progress update; `None` fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub location: Option<String>,
    pub percentage: Option<f64>,
}

impl ProgressUpdate {
    /// Whether the update carries nothing to write
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.location.is_none() && self.percentage.is_none()
    }
}
