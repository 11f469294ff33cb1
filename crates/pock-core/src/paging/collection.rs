//! Remote ordered collection contract and an in-process implementation

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{Item, ItemId};
use crate::paging::{Cursor, CursorPosition};

/// One page of a collection listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items in collection order (newest first)
    pub items: Vec<Item>,
    /// Position of the last item; `None` when the page is empty
    pub next_cursor: Option<Cursor>,
}

impl Page {
    /// Build a page from ordered items, minting the cursor of the last one
    pub fn from_items(items: Vec<Item>, epoch: u64) -> Result<Self> {
        let next_cursor = items
            .last()
            .map(|last| Cursor::encode(&CursorPosition::of(last, epoch)))
            .transpose()?;
        Ok(Self { items, next_cursor })
    }
}

/// A remote document collection ordered by descending `uploaded_at`.
#[allow(async_fn_in_trait)]
pub trait RemoteCollection {
    /// List up to `limit` items strictly after `after` (from the start when `None`)
    async fn list(&self, after: Option<&Cursor>, limit: usize) -> Result<Page>;

    /// Fetch a single item by id
    async fn get(&self, id: &ItemId) -> Result<Option<Item>>;

    /// Delete an item; `NotFound` when absent
    async fn delete(&self, id: &ItemId) -> Result<()>;

    /// Add an item, assigning its id and sort key
    async fn insert(&self, fields: Map<String, Value>) -> Result<Item>;
}

impl<C: RemoteCollection> RemoteCollection for &C {
    async fn list(&self, after: Option<&Cursor>, limit: usize) -> Result<Page> {
        (**self).list(after, limit).await
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &ItemId) -> Result<()> {
        (**self).delete(id).await
    }

    async fn insert(&self, fields: Map<String, Value>) -> Result<Item> {
        (**self).insert(fields).await
    }
}

impl<C: RemoteCollection> RemoteCollection for std::sync::Arc<C> {
    async fn list(&self, after: Option<&Cursor>, limit: usize) -> Result<Page> {
        (**self).list(after, limit).await
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &ItemId) -> Result<()> {
        (**self).delete(id).await
    }

    async fn insert(&self, fields: Map<String, Value>) -> Result<Item> {
        (**self).insert(fields).await
    }
}

/// Sort key for a new item: now, but never earlier than the newest existing item.
pub(crate) fn next_sort_key(newest: Option<i64>) -> i64 {
    let now = crate::util::unix_millis_now();
    newest.map_or(now, |newest| now.max(newest))
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// Kept in collection order
    items: Vec<Item>,
    epoch: u64,
}

/// In-process collection, useful for tests and offline previews.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    inner: Mutex<MemoryInner>,
}

impl MemoryCollection {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection seeded with items (any order)
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let collection = Self::new();
        for item in items {
            collection.put(item);
        }
        collection
    }

    /// Insert or replace an item keeping collection order
    pub fn put(&self, item: Item) {
        let mut inner = self.lock();
        inner.items.retain(|existing| existing.id != item.id);
        let index = inner
            .items
            .partition_point(|existing| existing.collection_order(&item).is_lt());
        inner.items.insert(index, item);
    }

    /// Remove every item and invalidate outstanding cursors
    pub fn truncate(&self) {
        let mut inner = self.lock();
        inner.items.clear();
        inner.epoch += 1;
        tracing::debug!("Truncated memory collection, now at epoch {}", inner.epoch);
    }

    /// Number of stored items
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether the collection holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteCollection for MemoryCollection {
    async fn list(&self, after: Option<&Cursor>, limit: usize) -> Result<Page> {
        let inner = self.lock();
        let position = after
            .map(|cursor| cursor.decode_for_epoch(inner.epoch))
            .transpose()?;

        let items = inner
            .items
            .iter()
            .filter(|item| position.map_or(true, |position| position.precedes(item)))
            .take(limit)
            .cloned()
            .collect();
        Page::from_items(items, inner.epoch)
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        Ok(self.lock().items.iter().find(|item| item.id == *id).cloned())
    }

    async fn delete(&self, id: &ItemId) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.items.len();
        inner.items.retain(|item| item.id != *id);
        if inner.items.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn insert(&self, fields: Map<String, Value>) -> Result<Item> {
        let newest = self.lock().items.first().map(|item| item.uploaded_at);
        let item = Item {
            id: ItemId::new(),
            uploaded_at: next_sort_key(newest),
            fields,
        };
        self.put(item.clone());
        Ok(item)
    }
}
