//! pock-core - Core library for pock
//!
//! This crate contains the paged collection sync, the document store, book
//! storage backends, the upload pipeline and the session lifecycle used by
//! pock front ends.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod paging;
pub mod services;
pub mod storage;
pub mod upload;
mod util;

pub use error::{Error, Result};
pub use models::{Item, ItemId};
pub use paging::{FetchOutcome, PagedCollectionSync, RemoteCollection, SyncState};
