//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// Configuration for a remote replica of the document store
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ReplicaConfig {
    /// Remote database URL (e.g., `libsql://library.turso.io`)
    pub url: Option<String>,
    /// Authentication token for remote database
    pub auth_token: Option<String>,
    /// Automatic sync interval (default: 60 seconds)
    pub sync_interval: Option<Duration>,
}

impl ReplicaConfig {
    /// Create a new replica configuration
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            auth_token: Some(auth_token.into()),
            sync_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Disable automatic sync (manual sync only)
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Check if the replica is fully configured
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.auth_token.is_some()
    }
}

impl fmt::Debug for ReplicaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    replica: Option<ReplicaConfig>,
}

impl Database {
    /// Open a local-only database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_database(db, None).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_database(db, None).await
    }

    /// Open a replica when one is configured, a local-only database otherwise
    pub async fn open_configured(
        path: impl AsRef<Path>,
        replica: Option<&ReplicaConfig>,
    ) -> Result<Self> {
        match replica {
            Some(replica) if replica.is_configured() => {
                Self::open_with_replica(path, replica.clone()).await
            }
            _ => Self::open(path).await,
        }
    }

    /// Open a local replica that syncs with a remote libSQL database
    ///
    /// Reads are served from the local file; writes go to the remote and
    /// sync back.
    pub async fn open_with_replica(
        local_path: impl AsRef<Path>,
        replica: ReplicaConfig,
    ) -> Result<Self> {
        let path_str = local_path.as_ref().to_string_lossy().to_string();

        let url = replica
            .url
            .clone()
            .ok_or_else(|| Error::InvalidInput("Replica URL is required".into()))?;
        let token = replica
            .auth_token
            .clone()
            .ok_or_else(|| Error::InvalidInput("Replica auth token is required".into()))?;

        let mut builder = Builder::new_remote_replica(&path_str, url, token);
        if let Some(interval) = replica.sync_interval {
            builder = builder.sync_interval(interval);
            tracing::debug!("Automatic replica sync interval set to {:?}", interval);
        }

        let db = builder.build().await?;
        let database = Self {
            conn: db.connect()?,
            db,
            replica: Some(replica),
        };

        // Pull the remote schema before migrating
        tracing::debug!("Performing initial replica sync...");
        database.sync().await?;
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    async fn from_database(db: LibSqlDatabase, replica: Option<ReplicaConfig>) -> Result<Self> {
        let database = Self {
            conn: db.connect()?,
            db,
            replica,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    async fn configure(&self) -> Result<()> {
        // Some pragmas are rejected by remote replicas
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Pull changes from the remote database when replicated
    pub async fn sync(&self) -> Result<()> {
        if self.replica.is_some() {
            self.db.sync().await?;
            tracing::debug!("Database synced with remote");
        }
        Ok(())
    }

    /// Check if this database is a remote replica
    pub const fn is_replica(&self) -> bool {
        self.replica.is_some()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
