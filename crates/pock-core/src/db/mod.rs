//! libSQL-backed document store and per-user tables

mod collection;
mod connection;
mod migrations;
mod profile_repository;
mod progress_repository;

pub use collection::LibSqlCollection;
pub use connection::{Database, ReplicaConfig};
pub use profile_repository::ProfileRepository;
pub use progress_repository::{LibSqlProgressRepository, ProgressRepository};
