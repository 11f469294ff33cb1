//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: document collections
const V1: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    // One row per document; `collection` is a path like users/{uid}/uploads
    "CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        uploaded_at INTEGER NOT NULL,
        fields TEXT NOT NULL DEFAULT '{}',
        PRIMARY KEY (collection, id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_documents_order
        ON documents(collection, uploaded_at DESC, id DESC)",
    // Bumped on truncation to invalidate cursors
    "CREATE TABLE IF NOT EXISTS collection_epochs (
        collection TEXT PRIMARY KEY,
        epoch INTEGER NOT NULL DEFAULT 0
    )",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Version 2: reading progress and per-user profile data
const V2: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS reading_progress (
        user_id TEXT NOT NULL,
        book_id TEXT NOT NULL,
        location TEXT,
        percentage REAL,
        last_updated INTEGER NOT NULL,
        PRIMARY KEY (user_id, book_id)
    )",
    "CREATE TABLE IF NOT EXISTS reading_stats (
        user_id TEXT PRIMARY KEY,
        total_books_read INTEGER NOT NULL DEFAULT 0,
        total_reading_time INTEGER NOT NULL DEFAULT 0,
        reading_streak INTEGER NOT NULL DEFAULT 0,
        last_read_date INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reading_goals (
        user_id TEXT PRIMARY KEY,
        daily INTEGER NOT NULL,
        weekly INTEGER NOT NULL,
        pages_per_day INTEGER NOT NULL,
        books_per_month INTEGER NOT NULL,
        start_date INTEGER NOT NULL,
        last_updated INTEGER NOT NULL
    )",
    "INSERT INTO schema_version (version) VALUES (2)",
];

/// Run one migration's statements inside a transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {}", version);
    Ok(())
}
