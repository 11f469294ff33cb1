pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod library;
pub mod progress;
pub mod upload;
