//! Cursor pagination over remote document collections

mod collection;
mod cursor;
mod sync;

pub use collection::{MemoryCollection, Page, RemoteCollection};
pub(crate) use collection::next_sort_key;
pub use cursor::{Cursor, CursorPosition};
pub use sync::{FetchOutcome, PagedCollectionSync, SyncState, DEFAULT_PAGE_SIZE};
