//! libSQL-backed document collection

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use libsql::{params, Connection};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{CollectionPath, Item, ItemId};
use crate::paging::{next_sort_key, Cursor, Page, RemoteCollection};

/// One collection of the `documents` table, paged with keyset cursors on
/// `(uploaded_at, id)`.
pub struct LibSqlCollection<'a> {
    conn: &'a Connection,
    path: CollectionPath,
}

impl<'a> LibSqlCollection<'a> {
    /// Create a collection handle on the given connection
    pub const fn new(conn: &'a Connection, path: CollectionPath) -> Self {
        Self { conn, path }
    }

    pub const fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// Current cursor epoch of this collection
    pub async fn epoch(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT epoch FROM collection_epochs WHERE collection = ?",
                params![self.path.as_str()],
            )
            .await
            .map_err(transport)?;

        let epoch = match rows.next().await.map_err(transport)? {
            Some(row) => row.get::<i64>(0).map_err(transport)?,
            None => 0,
        };
        Ok(u64::try_from(epoch).unwrap_or_default())
    }

    /// Delete every document and invalidate outstanding cursors
    pub async fn truncate(&self) -> Result<u64> {
        self.conn
            .execute("BEGIN TRANSACTION", ())
            .await
            .map_err(transport)?;

        let result = async {
            let deleted = self
                .conn
                .execute(
                    "DELETE FROM documents WHERE collection = ?",
                    params![self.path.as_str()],
                )
                .await?;
            self.conn
                .execute(
                    "INSERT INTO collection_epochs (collection, epoch) VALUES (?1, 1)
                     ON CONFLICT(collection) DO UPDATE SET epoch = epoch + 1",
                    params![self.path.as_str()],
                )
                .await?;
            self.conn.execute("COMMIT", ()).await?;
            Ok::<u64, libsql::Error>(deleted)
        }
        .await;

        match result {
            Ok(deleted) => {
                tracing::info!("Truncated collection {} ({} documents)", self.path, deleted);
                Ok(deleted)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(transport(error))
            }
        }
    }

    /// Count documents in this collection
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM documents WHERE collection = ?",
                params![self.path.as_str()],
            )
            .await
            .map_err(transport)?;
        let count = match rows.next().await.map_err(transport)? {
            Some(row) => row.get::<i64>(0).map_err(transport)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn newest_sort_key(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COALESCE(MAX(uploaded_at), 0) FROM documents WHERE collection = ?",
                params![self.path.as_str()],
            )
            .await
            .map_err(transport)?;
        match rows.next().await.map_err(transport)? {
            Some(row) => row.get::<i64>(0).map_err(transport),
            None => Ok(0),
        }
    }

    /// Keyset page query; runs inside the caller's transaction
    async fn list_after(
        &self,
        after: Option<&Cursor>,
        epoch: u64,
        limit: usize,
    ) -> Result<Vec<Item>> {
        let position = after
            .map(|cursor| cursor.decode_for_epoch(epoch))
            .transpose()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut rows = match position {
            None => self
                .conn
                .query(
                    "SELECT id, uploaded_at, fields
                     FROM documents
                     WHERE collection = ?1
                     ORDER BY uploaded_at DESC, id DESC
                     LIMIT ?2",
                    params![self.path.as_str(), limit],
                )
                .await
                .map_err(transport)?,
            Some(position) => self
                .conn
                .query(
                    "SELECT id, uploaded_at, fields
                     FROM documents
                     WHERE collection = ?1
                       AND (uploaded_at < ?2 OR (uploaded_at = ?2 AND id < ?3))
                     ORDER BY uploaded_at DESC, id DESC
                     LIMIT ?4",
                    params![
                        self.path.as_str(),
                        position.uploaded_at,
                        position.id.as_str(),
                        limit
                    ],
                )
                .await
                .map_err(transport)?,
        };

        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(transport)? {
            items.push(Self::parse_item(&row)?);
        }
        Ok(items)
    }

    /// Parse an item from a `(id, uploaded_at, fields)` row
    fn parse_item(row: &libsql::Row) -> Result<Item> {
        let id: String = row.get(0).map_err(transport)?;
        let fields: String = row.get(2).map_err(transport)?;
        let fields = match serde_json::from_str::<Value>(&fields)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        Ok(Item {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("Invalid document id: {id}")))?,
            uploaded_at: row.get(1).map_err(transport)?,
            fields,
        })
    }
}

impl RemoteCollection for LibSqlCollection<'_> {
    async fn list(&self, after: Option<&Cursor>, limit: usize) -> Result<Page> {
        // Epoch and rows are read from one snapshot
        self.conn
            .execute("BEGIN TRANSACTION", ())
            .await
            .map_err(transport)?;

        let result = async {
            let epoch = self.epoch().await?;
            let items = self.list_after(after, epoch, limit).await?;
            self.conn.execute("COMMIT", ()).await.map_err(transport)?;
            Ok::<_, Error>((items, epoch))
        }
        .await;

        match result {
            Ok((items, epoch)) => {
                tracing::debug!(collection = %self.path, returned = items.len(), "Listed documents");
                Page::from_items(items, epoch)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, uploaded_at, fields FROM documents WHERE collection = ? AND id = ?",
                params![self.path.as_str(), id.as_str()],
            )
            .await
            .map_err(transport)?;

        match rows.next().await.map_err(transport)? {
            Some(row) => Ok(Some(Self::parse_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &ItemId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ? AND id = ?",
                params![self.path.as_str(), id.as_str()],
            )
            .await
            .map_err(transport)?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        tracing::debug!(collection = %self.path, %id, "Deleted document");
        Ok(())
    }

    async fn insert(&self, fields: Map<String, Value>) -> Result<Item> {
        let item = Item {
            id: ItemId::new(),
            uploaded_at: next_sort_key(Some(self.newest_sort_key().await?)),
            fields,
        };
        let payload = serde_json::to_string(&item.fields)?;

        self.conn
            .execute(
                "INSERT INTO documents (collection, id, uploaded_at, fields) VALUES (?, ?, ?, ?)",
                params![
                    self.path.as_str(),
                    item.id.as_str(),
                    item.uploaded_at,
                    payload
                ],
            )
            .await
            .map_err(transport)?;

        tracing::debug!(collection = %self.path, id = %item.id, "Inserted document");
        Ok(item)
    }
}

fn transport(error: libsql::Error) -> Error {
    Error::Transport(format!("document store: {error}"))
}
