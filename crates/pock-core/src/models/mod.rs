//! Data models for pock

mod book;
mod item;
mod path;
mod profile;
mod progress;

pub use book::{BookFormat, BookMetadata, BookRecord};
pub use item::{Item, ItemId};
pub use path::CollectionPath;
pub use profile::{ReadingGoals, ReadingStats};
pub use progress::{ProgressUpdate, ReadingProgress};
