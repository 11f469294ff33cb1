use std::env;
use std::path::PathBuf;

use chrono::Utc;
use pock_core::auth::{SessionManager, UserIdentity};
use pock_core::config::ClientConfig;
use pock_core::db::Database;
use pock_core::models::BookRecord;
use pock_core::storage::AnyBookStorage;
use pock_core::{Item, ItemId};
use serde::Serialize;

use crate::auth::{restored_session_manager, SessionStore};
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Everything a command needs to know about the active profile
pub struct CliContext {
    pub profile_name: String,
    pub profile: CliProfile,
    pub client_config: ClientConfig,
    pub db_path: PathBuf,
}

impl CliContext {
    pub fn load(cli_db_path: Option<PathBuf>, profile: Option<&str>) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(profile);
        let profile = config.profile(&profile_name).cloned().unwrap_or_default();
        let client_config = ClientConfig::from_env()?;

        Ok(Self {
            profile_name,
            profile,
            client_config,
            db_path: resolve_db_path(cli_db_path),
        })
    }

    /// Page size: flag, then profile, then environment/default
    pub fn page_size(&self, explicit: Option<usize>) -> Result<usize, CliError> {
        resolve_page_size(explicit, self.profile.page_size, self.client_config.page_size)
    }

    pub fn storage(&self) -> AnyBookStorage {
        let mut config = self.client_config.clone();
        if config.storage_dir.is_none() {
            config.storage_dir = self.profile.storage_dir();
        }
        AnyBookStorage::from_backend(config.storage_backend(default_storage_dir()))
    }

    pub fn sessions(&self) -> Result<SessionManager<SessionStore>, CliError> {
        Ok(restored_session_manager(&self.profile_name)?)
    }

    pub fn require_user(&self) -> Result<UserIdentity, CliError> {
        self.sessions()?
            .require_user()
            .map_err(|_| CliError::NotSignedIn)
    }

    /// Open the document store, as a remote replica when one is configured
    pub async fn database(&self) -> Result<Database, CliError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Database::open_configured(&self.db_path, self.client_config.replica.as_ref()).await?)
    }
}

#[derive(Debug, Serialize)]
pub struct BookListItem {
    pub id: String,
    pub title: String,
    pub author: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub uri: String,
    pub uploaded_at: i64,
    pub relative_time: String,
}

pub fn resolve_page_size(
    explicit: Option<usize>,
    profile: Option<usize>,
    configured: usize,
) -> Result<usize, CliError> {
    match explicit.or(profile) {
        Some(size) => Ok(pock_core::config::parse_page_size(&size.to_string())?),
        None => Ok(configured),
    }
}

pub fn parse_book_id(id: &str) -> Result<ItemId, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyBookId);
    }
    trimmed
        .parse::<ItemId>()
        .map_err(|_| CliError::InvalidBookId(trimmed.to_string()))
}

/// Title/author/name for an item, whether or not it is a book record
fn book_labels(item: &Item) -> (String, String, Option<BookRecord>) {
    match BookRecord::from_item(item) {
        Ok(record) => (
            record.metadata.title.clone(),
            record.metadata.author.clone(),
            Some(record),
        ),
        Err(_) => (
            item.field_str("title").unwrap_or("Unknown").to_string(),
            item.field_str("author").unwrap_or("Unknown").to_string(),
            None,
        ),
    }
}

pub fn format_book_lines(items: &[Item]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    items
        .iter()
        .map(|item| {
            let id = item.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let (title, author, record) = book_labels(item);
            let label = truncate(&format!("{title} - {author}"), 40);
            let relative_time = format_relative_time(item.uploaded_at, now_ms);

            match record {
                Some(record) => format!(
                    "{short_id:<13}  {label:<40}  {relative_time:<10}  {}",
                    format_size(record.size)
                ),
                None => format!("{short_id:<13}  {label:<40}  {relative_time}"),
            }
        })
        .collect()
}

pub fn book_to_list_item(item: &Item) -> BookListItem {
    let now_ms = Utc::now().timestamp_millis();
    let (title, author, record) = book_labels(item);
    let record = record.unwrap_or_else(|| BookRecord {
        name: item.field_str("name").unwrap_or_default().to_string(),
        path: String::new(),
        uri: item.field_str("uri").unwrap_or_default().to_string(),
        mime_type: item.field_str("type").unwrap_or_default().to_string(),
        size: 0,
        metadata: pock_core::models::BookMetadata::default(),
    });

    BookListItem {
        id: item.id.to_string(),
        title,
        author,
        name: record.name,
        mime_type: record.mime_type,
        size: record.size,
        uri: record.uri,
        uploaded_at: item.uploaded_at,
        relative_time: format_relative_time(item.uploaded_at, now_ms),
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("POCK_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("pock")
}

pub fn default_db_path() -> PathBuf {
    data_dir().join("pock.db")
}

pub fn default_storage_dir() -> PathBuf {
    data_dir().join("books")
}
