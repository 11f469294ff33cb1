//! Paged, mutation-aware window over a remote collection.
//!
//! A [`PagedCollectionSync`] materializes a newest-first prefix of a remote
//! collection. Pages are appended with [`fetch_next`], the whole window is
//! replaced with [`refresh`], and deletions already applied remotely are
//! projected locally with [`remove_local`].
//!
//! `fetch_next` and `refresh` are single-flight: a call made while another is
//! in flight returns [`FetchOutcome::Skipped`] and changes nothing. Failed
//! flights leave the window, cursor and `has_more` exactly as they were.
//!
//! [`fetch_next`]: PagedCollectionSync::fetch_next
//! [`refresh`]: PagedCollectionSync::refresh
//! [`remove_local`]: PagedCollectionSync::remove_local

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::models::{Item, ItemId};
use crate::paging::{Cursor, Page, RemoteCollection};

/// Page size used when none is configured
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Snapshot of a sync's materialized state
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    /// Materialized items, newest first
    pub window: Vec<Item>,
    /// Position of the last fetched item
    pub cursor: Option<Cursor>,
    /// Whether another page may exist
    pub has_more: bool,
    /// Whether a fetch or refresh is in flight
    pub loading: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            window: Vec::new(),
            cursor: None,
            has_more: true,
            loading: false,
        }
    }
}

impl SyncState {
    /// Ids of the window in order
    #[must_use]
    pub fn ids(&self) -> Vec<ItemId> {
        self.window.iter().map(|item| item.id).collect()
    }
}

/// What a fetch or refresh call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was applied; `appended` items are new in the window
    Applied { appended: usize },
    /// Nothing was requested: already loading, exhausted, or detached
    Skipped,
    /// The owner detached while the request was in flight; result dropped
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flight {
    Append,
    Replace,
}

#[derive(Debug, Default)]
struct Inner {
    state: SyncState,
    /// Ids removed locally while a flight was out
    removed_in_flight: HashSet<ItemId>,
}

/// Locally materialized, paginated window over a [`RemoteCollection`].
#[derive(Debug)]
pub struct PagedCollectionSync<C> {
    collection: C,
    page_size: usize,
    inner: Mutex<Inner>,
    attached: AtomicBool,
}

impl<C: RemoteCollection> PagedCollectionSync<C> {
    /// Create an empty sync using [`DEFAULT_PAGE_SIZE`]
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            page_size: DEFAULT_PAGE_SIZE,
            inner: Mutex::new(Inner::default()),
            attached: AtomicBool::new(true),
        }
    }

    /// Create an empty sync with an explicit page size
    pub fn with_page_size(collection: C, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::InvalidInput(
                "Page size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            page_size,
            ..Self::new(collection)
        })
    }

    /// The collection this window mirrors
    pub const fn collection(&self) -> &C {
        &self.collection
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Copy of the current state
    pub fn state(&self) -> SyncState {
        self.lock().state.clone()
    }

    /// Copy of the current window
    pub fn window(&self) -> Vec<Item> {
        self.lock().state.window.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().state.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.loading
    }

    /// Whether results are still being applied
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Mark the owner as gone. In-flight results are dropped and later calls skipped.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        tracing::debug!("Paged sync detached");
    }

    /// Append the next page after the current cursor.
    pub async fn fetch_next(&self) -> Result<FetchOutcome> {
        let cursor = {
            let mut inner = self.lock();
            if !self.is_attached() || inner.state.loading || !inner.state.has_more {
                tracing::debug!(
                    loading = inner.state.loading,
                    has_more = inner.state.has_more,
                    "Skipping fetch_next"
                );
                return Ok(FetchOutcome::Skipped);
            }
            Self::begin_flight(&mut inner);
            inner.state.cursor.clone()
        };

        tracing::debug!(page_size = self.page_size, "Fetching next page");
        let result = self.collection.list(cursor.as_ref(), self.page_size).await;
        self.finish_flight(result, Flight::Append)
    }

    /// Replace the window with the first page of the collection.
    ///
    /// The previous window stays visible until the new page arrives and is
    /// kept unchanged if the request fails.
    pub async fn refresh(&self) -> Result<FetchOutcome> {
        {
            let mut inner = self.lock();
            if !self.is_attached() || inner.state.loading {
                tracing::debug!(loading = inner.state.loading, "Skipping refresh");
                return Ok(FetchOutcome::Skipped);
            }
            Self::begin_flight(&mut inner);
        }

        tracing::debug!(page_size = self.page_size, "Refreshing from the first page");
        let result = self.collection.list(None, self.page_size).await;
        self.finish_flight(result, Flight::Replace)
    }

    /// Drop an item from the window. Returns whether it was present.
    ///
    /// Purely local: the remote delete is the caller's job. Cursor and
    /// `has_more` are never touched.
    pub fn remove_local(&self, id: &ItemId) -> bool {
        let mut inner = self.lock();
        if inner.state.loading {
            inner.removed_in_flight.insert(*id);
        }
        let before = inner.state.window.len();
        inner.state.window.retain(|item| item.id != *id);
        let removed = inner.state.window.len() != before;
        if removed {
            tracing::debug!(%id, "Removed item from local window");
        }
        removed
    }

    fn begin_flight(inner: &mut Inner) {
        inner.state.loading = true;
        inner.removed_in_flight.clear();
    }

    fn finish_flight(&self, result: Result<Page>, flight: Flight) -> Result<FetchOutcome> {
        let mut inner = self.lock();
        inner.state.loading = false;
        let removed = std::mem::take(&mut inner.removed_in_flight);

        if !self.is_attached() {
            tracing::debug!("Discarding page for detached sync");
            return Ok(FetchOutcome::Discarded);
        }

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                tracing::warn!("Paged fetch failed, window left unchanged: {}", error);
                return Err(error);
            }
        };

        let returned = page.items.len();
        let has_more = returned == self.page_size && page.next_cursor.is_some();

        let mut seen: HashSet<ItemId> = match flight {
            Flight::Append => inner.state.window.iter().map(|item| item.id).collect(),
            Flight::Replace => HashSet::new(),
        };
        let fresh: Vec<Item> = page
            .items
            .into_iter()
            .filter(|item| !removed.contains(&item.id) && seen.insert(item.id))
            .collect();
        let appended = fresh.len();

        match flight {
            Flight::Append => {
                inner.state.window.extend(fresh);
                if page.next_cursor.is_some() {
                    inner.state.cursor = page.next_cursor;
                }
            }
            Flight::Replace => {
                inner.state.window = fresh;
                inner.state.cursor = page.next_cursor;
            }
        }
        inner.state.has_more = has_more;

        tracing::debug!(
            returned,
            appended,
            has_more,
            window = inner.state.window.len(),
            "Applied page"
        );
        Ok(FetchOutcome::Applied { appended })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value};
    use tokio::sync::Semaphore;

    use super::*;
    use crate::paging::MemoryCollection;

    /// Memory collection with scripted failures and an optional gate that
    /// holds `list` calls until permits are released.
    #[derive(Default)]
    struct ScriptedCollection {
        inner: MemoryCollection,
        failures: Mutex<VecDeque<Error>>,
        gate: Option<Semaphore>,
    }

    impl ScriptedCollection {
        fn seeded(count: i64) -> Self {
            Self {
                inner: MemoryCollection::with_items((1..=count).map(item_at)),
                ..Self::default()
            }
        }

        fn gated(mut self) -> Self {
            self.gate = Some(Semaphore::new(0));
            self
        }

        fn open_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn fail_next(&self, error: Error) {
            self.failures.lock().unwrap().push_back(error);
        }
    }

    impl RemoteCollection for ScriptedCollection {
        async fn list(&self, after: Option<&Cursor>, limit: usize) -> Result<Page> {
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|error| Error::Transport(error.to_string()))?
                    .forget();
            }
            let scripted = self.failures.lock().unwrap().pop_front();
            if let Some(error) = scripted {
                return Err(error);
            }
            self.inner.list(after, limit).await
        }

        async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
            self.inner.get(id).await
        }

        async fn delete(&self, id: &ItemId) -> Result<()> {
            self.inner.delete(id).await
        }

        async fn insert(&self, fields: Map<String, Value>) -> Result<Item> {
            self.inner.insert(fields).await
        }
    }

    fn item_at(n: i64) -> Item {
        let mut fields = Map::new();
        fields.insert("n".to_string(), Value::from(n));
        Item {
            id: ItemId::new(),
            uploaded_at: n * 1_000,
            fields,
        }
    }

    fn keys(items: &[Item]) -> Vec<i64> {
        items.iter().map(|item| item.uploaded_at / 1_000).collect()
    }

    #[tokio::test]
    async fn test_new_state_is_empty_and_hungry() {
        let collection = MemoryCollection::new();
        let sync = PagedCollectionSync::new(&collection);
        let state = sync.state();
        assert!(state.window.is_empty());
        assert!(state.cursor.is_none());
        assert!(state.has_more);
        assert!(!state.loading);
        assert_eq!(sync.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let collection = MemoryCollection::new();
        assert!(PagedCollectionSync::with_page_size(&collection, 0).is_err());
    }

    #[tokio::test]
    async fn test_ten_then_four_items() {
        let collection = ScriptedCollection::seeded(14);
        let sync = PagedCollectionSync::with_page_size(&collection, 10).unwrap();

        let outcome = sync.fetch_next().await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied { appended: 10 });
        let state = sync.state();
        assert!(state.has_more);
        let cursor = state.cursor.clone().unwrap().decode().unwrap();
        assert_eq!(cursor.id, state.window[9].id);
        assert_eq!(cursor.uploaded_at, state.window[9].uploaded_at);

        let outcome = sync.fetch_next().await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied { appended: 4 });
        let state = sync.state();
        assert!(!state.has_more);
        assert_eq!(state.window.len(), 14);
        assert_eq!(keys(&state.window), (1..=14).rev().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_window_grows_as_prefix_extension() {
        let collection = ScriptedCollection::seeded(23);
        let sync = PagedCollectionSync::with_page_size(&collection, 5).unwrap();

        let mut previous = sync.window();
        while sync.has_more() {
            sync.fetch_next().await.unwrap();
            let current = sync.window();
            assert!(current.len() >= previous.len());
            assert_eq!(&current[..previous.len()], previous.as_slice());
            previous = current;
        }
        assert_eq!(previous.len(), 23);
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let collection = ScriptedCollection::seeded(10);
        let sync = PagedCollectionSync::with_page_size(&collection, 5).unwrap();

        sync.fetch_next().await.unwrap();
        sync.fetch_next().await.unwrap();
        assert!(sync.has_more());
        let cursor_before = sync.state().cursor;

        let outcome = sync.fetch_next().await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied { appended: 0 });
        let state = sync.state();
        assert!(!state.has_more);
        assert_eq!(state.cursor, cursor_before);
        assert_eq!(state.window.len(), 10);
    }

    #[tokio::test]
    async fn test_fetch_when_exhausted_is_noop() {
        let collection = ScriptedCollection::seeded(3);
        let sync = PagedCollectionSync::with_page_size(&collection, 5).unwrap();
        sync.fetch_next().await.unwrap();
        let before = sync.state();

        assert_eq!(sync.fetch_next().await.unwrap(), FetchOutcome::Skipped);
        assert_eq!(sync.state(), before);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_state_unchanged() {
        let collection = ScriptedCollection::seeded(12);
        let sync = PagedCollectionSync::with_page_size(&collection, 5).unwrap();
        sync.fetch_next().await.unwrap();
        let before = sync.state();

        collection.fail_next(Error::Transport("offline".to_string()));
        let error = sync.fetch_next().await.unwrap_err();
        assert!(error.is_retryable());
        assert_eq!(sync.state(), before);

        // retrying with the same cursor continues where it left off
        sync.fetch_next().await.unwrap();
        assert_eq!(keys(&sync.window()), (3..=12).rev().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_invalid_cursor_recovers_through_refresh() {
        let collection = ScriptedCollection::seeded(8);
        let sync = PagedCollectionSync::with_page_size(&collection, 3).unwrap();
        sync.fetch_next().await.unwrap();

        collection.inner.truncate();
        collection.inner.put(item_at(50));
        let before = sync.state();

        let error = sync.fetch_next().await.unwrap_err();
        assert!(error.requires_refresh());
        assert_eq!(sync.state(), before);

        let outcome = sync.refresh().await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied { appended: 1 });
        assert_eq!(keys(&sync.window()), vec![50]);
        assert!(!sync.has_more());
    }

    #[tokio::test]
    async fn test_refresh_matches_fresh_first_page() {
        let collection = ScriptedCollection::seeded(9);
        let sync = PagedCollectionSync::with_page_size(&collection, 4).unwrap();
        sync.fetch_next().await.unwrap();
        sync.fetch_next().await.unwrap();
        sync.remove_local(&sync.window()[1].id);

        collection.inner.put(item_at(20));
        sync.refresh().await.unwrap();

        let fresh = PagedCollectionSync::with_page_size(&collection, 4).unwrap();
        fresh.fetch_next().await.unwrap();

        let refreshed = sync.state();
        let expected = fresh.state();
        assert_eq!(refreshed.window, expected.window);
        assert_eq!(refreshed.cursor, expected.cursor);
        assert_eq!(refreshed.has_more, expected.has_more);
        assert_eq!(keys(&refreshed.window), vec![20, 9, 8, 7]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_window() {
        let collection = ScriptedCollection::seeded(6);
        let sync = PagedCollectionSync::with_page_size(&collection, 4).unwrap();
        sync.fetch_next().await.unwrap();
        let before = sync.state();

        collection.fail_next(Error::Transport("timeout".to_string()));
        assert!(sync.refresh().await.is_err());
        assert_eq!(sync.state(), before);
    }

    #[tokio::test]
    async fn test_remove_local_preserves_order_and_paging() {
        let collection = ScriptedCollection::seeded(3);
        let sync = PagedCollectionSync::with_page_size(&collection, 3).unwrap();
        sync.fetch_next().await.unwrap();
        let before = sync.state();
        let [a, b, c] = [before.window[0].id, before.window[1].id, before.window[2].id];

        assert!(sync.remove_local(&b));
        let after = sync.state();
        assert_eq!(after.ids(), vec![a, c]);
        assert_eq!(after.cursor, before.cursor);
        assert_eq!(after.has_more, before.has_more);
    }

    #[tokio::test]
    async fn test_remove_local_unknown_id_is_noop() {
        let collection = ScriptedCollection::seeded(2);
        let sync = PagedCollectionSync::with_page_size(&collection, 5).unwrap();
        sync.fetch_next().await.unwrap();
        let before = sync.state();

        assert!(!sync.remove_local(&ItemId::new()));
        assert_eq!(sync.state(), before);
        assert!(!sync.has_more());
    }

    #[tokio::test]
    async fn test_fetch_while_loading_is_dropped() {
        let collection = ScriptedCollection::seeded(30).gated();
        let sync = PagedCollectionSync::with_page_size(&collection, 10).unwrap();

        let (first, second) = tokio::join!(sync.fetch_next(), async {
            tokio::task::yield_now().await;
            assert!(sync.is_loading());
            let second = sync.fetch_next().await;
            let refresh = sync.refresh().await;
            collection.open_gate();
            (second, refresh)
        });

        assert_eq!(first.unwrap(), FetchOutcome::Applied { appended: 10 });
        let (second, refresh) = second;
        assert_eq!(second.unwrap(), FetchOutcome::Skipped);
        assert_eq!(refresh.unwrap(), FetchOutcome::Skipped);
        assert_eq!(keys(&sync.window()), (21..=30).rev().collect::<Vec<_>>());
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn test_remove_during_flight_is_not_resurrected() {
        let collection = ScriptedCollection::seeded(6).gated();
        let sync = PagedCollectionSync::with_page_size(&collection, 10).unwrap();
        collection.open_gate();
        sync.fetch_next().await.unwrap();
        let doomed = sync.window()[2].id;

        let (outcome, ()) = tokio::join!(sync.refresh(), async {
            tokio::task::yield_now().await;
            assert!(sync.remove_local(&doomed));
            collection.open_gate();
        });

        assert_eq!(outcome.unwrap(), FetchOutcome::Applied { appended: 5 });
        assert!(!sync.state().ids().contains(&doomed));
    }

    #[tokio::test]
    async fn test_detached_owner_discards_result() {
        let collection = ScriptedCollection::seeded(5).gated();
        let sync = PagedCollectionSync::with_page_size(&collection, 2).unwrap();

        let (outcome, ()) = tokio::join!(sync.fetch_next(), async {
            tokio::task::yield_now().await;
            sync.detach();
            collection.open_gate();
        });

        assert_eq!(outcome.unwrap(), FetchOutcome::Discarded);
        let state = sync.state();
        assert!(state.window.is_empty());
        assert!(state.cursor.is_none());
        assert!(!state.loading);

        collection.open_gate();
        assert_eq!(sync.fetch_next().await.unwrap(), FetchOutcome::Skipped);
        assert_eq!(sync.refresh().await.unwrap(), FetchOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_not_appended_twice() {
        let collection = ScriptedCollection::seeded(4);
        let sync = PagedCollectionSync::with_page_size(&collection, 2).unwrap();
        sync.fetch_next().await.unwrap();
        let first_id = sync.window()[0].id;

        // the same document reappears further down after an edit moved its key back
        let mut moved = sync.window()[0].clone();
        moved.uploaded_at = 1_500;
        collection.inner.put(moved);

        sync.fetch_next().await.unwrap();
        sync.fetch_next().await.unwrap();
        let ids = sync.state().ids();
        assert_eq!(ids.iter().filter(|id| **id == first_id).count(), 1);
        assert_eq!(ids.len(), 4);
    }
}
