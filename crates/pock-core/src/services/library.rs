//! Library maintenance across the window, the collection and book storage.

use crate::error::{Error, Result};
use crate::models::{BookRecord, ItemId};
use crate::paging::{PagedCollectionSync, RemoteCollection};
use crate::storage::BookStorage;

/// Delete a book everywhere it lives.
///
/// The document is deleted remotely first; the window only changes once
/// that succeeds.
pub async fn delete_book<C, S>(
    sync: &PagedCollectionSync<C>,
    storage: &S,
    id: &ItemId,
) -> Result<()>
where
    C: RemoteCollection,
    S: BookStorage,
{
    delete_book_record(sync.collection(), storage, id).await?;
    sync.remove_local(id);
    Ok(())
}

/// Delete a book's document and its stored file, with no window involved.
///
/// The stored file is removed after the document and a failure there is
/// logged, not returned, since the library no longer references it.
pub async fn delete_book_record<C, S>(collection: &C, storage: &S, id: &ItemId) -> Result<()>
where
    C: RemoteCollection,
    S: BookStorage,
{
    let item = collection
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(id.to_string()))?;

    collection.delete(id).await?;
    tracing::info!(%id, "Deleted book record");

    match BookRecord::from_item(&item) {
        Ok(record) => {
            if let Err(error) = storage.delete_object(&record.path).await {
                tracing::warn!("Failed to delete stored file {}: {}", record.path, error);
            }
        }
        Err(error) => tracing::warn!(%id, "Deleted item was not a book record: {}", error),
    }
    Ok(())
}
