//! Client configuration resolved from the environment.
//!
//! Provides a `ClientConfig` used by the CLI (and any other front end) to
//! pick a page size and a book storage backend.

use std::env;
use std::path::PathBuf;

use crate::db::ReplicaConfig;
use crate::error::{Error, Result};
use crate::paging::DEFAULT_PAGE_SIZE;
use crate::storage::R2Config;
use crate::util::normalize_text_option;

const ENV_PAGE_SIZE: &str = "POCK_PAGE_SIZE";
const ENV_STORAGE_DIR: &str = "POCK_STORAGE_DIR";
const ENV_REPLICA_URL: &str = "POCK_REPLICA_URL";
const ENV_REPLICA_AUTH_TOKEN: &str = "POCK_REPLICA_AUTH_TOKEN";

/// Largest page size accepted from configuration
pub const MAX_PAGE_SIZE: usize = 500;

/// Where uploaded book files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files under a local directory
    Local(PathBuf),
    /// Cloudflare R2 bucket
    R2(R2Config),
}

/// Runtime configuration for a pock client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Items per `fetch_next`
    pub page_size: usize,
    /// Explicit local storage directory, if set
    pub storage_dir: Option<PathBuf>,
    /// R2 settings, if set
    pub r2: Option<R2Config>,
    /// Remote libSQL document store, if set
    pub replica: Option<ReplicaConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            storage_dir: None,
            r2: None,
            replica: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let page_size = match normalize_text_option(lookup(ENV_PAGE_SIZE)) {
            Some(raw) => parse_page_size(&raw).map_err(|error| match error {
                Error::InvalidInput(message) => {
                    Error::InvalidInput(format!("{ENV_PAGE_SIZE}: {message}"))
                }
                other => other,
            })?,
            None => DEFAULT_PAGE_SIZE,
        };
        let storage_dir = normalize_text_option(lookup(ENV_STORAGE_DIR)).map(PathBuf::from);
        let r2 = R2Config::from_lookup(&lookup)?;
        let replica = parse_replica(&lookup)?;

        Ok(Self {
            page_size,
            storage_dir,
            r2,
            replica,
        })
    }

    /// Pick the storage backend. R2 wins when configured.
    #[must_use]
    pub fn storage_backend(&self, default_dir: impl Into<PathBuf>) -> StorageBackend {
        if let Some(r2) = &self.r2 {
            return StorageBackend::R2(r2.clone());
        }
        StorageBackend::Local(
            self.storage_dir
                .clone()
                .unwrap_or_else(|| default_dir.into()),
        )
    }
}

fn parse_replica(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<ReplicaConfig>> {
    let url = normalize_text_option(lookup(ENV_REPLICA_URL));
    let token = normalize_text_option(lookup(ENV_REPLICA_AUTH_TOKEN));
    match (url, token) {
        (Some(url), Some(token)) => Ok(Some(ReplicaConfig::new(url, token))),
        (None, None) => Ok(None),
        _ => Err(Error::InvalidInput(format!(
            "{ENV_REPLICA_URL} and {ENV_REPLICA_AUTH_TOKEN} must be set together"
        ))),
    }
}

/// Parse and bound a page size
pub fn parse_page_size(raw: &str) -> Result<usize> {
    let value: usize = raw.trim().parse().map_err(|_| {
        Error::InvalidInput(format!("Page size must be a positive integer, got {raw:?}"))
    })?;
    if value == 0 || value > MAX_PAGE_SIZE {
        return Err(Error::InvalidInput(format!(
            "Page size must be between 1 and {MAX_PAGE_SIZE}, got {value}"
        )));
    }
    Ok(value)
}
