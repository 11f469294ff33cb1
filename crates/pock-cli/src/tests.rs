use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use pock_core::auth::UserIdentity;
use pock_core::db::{Database, LibSqlCollection};
use pock_core::models::{BookMetadata, CollectionPath, ProgressUpdate};
use pock_core::paging::{Cursor, MemoryCollection, Page, RemoteCollection};
use pock_core::storage::LocalBookStorage;
use pock_core::upload::Uploader;
use pock_core::{Item, ItemId};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

use crate::cli::{Cli, Commands, CompletionShell, PageArgs};
use crate::commands::common::{
    book_to_list_item, format_book_lines, format_relative_time, format_size, format_timestamp,
    parse_book_id, resolve_page_size, truncate,
};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config_init;
use crate::commands::delete::delete_upload;
use crate::commands::library::load_pages;
use crate::commands::progress::{format_progress, load_progress, save_progress};
use crate::commands::upload::upload_book;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

fn fields(title: &str) -> Map<String, Value> {
    let Value::Object(map) = json!({ "title": title, "author": "Tester" }) else {
        unreachable!()
    };
    map
}

#[test]
fn parse_listing_flags() {
    let cli = Cli::try_parse_from(["pock", "library", "--pages", "3", "--page-size", "5"]).unwrap();
    let Some(Commands::Library(args)) = cli.command else {
        panic!("expected library command");
    };
    assert_eq!(
        args,
        PageArgs {
            page_size: Some(5),
            pages: 3,
            all: false,
            json: false,
        }
    );
}

#[test]
fn parse_listing_defaults_to_one_page() {
    let cli = Cli::try_parse_from(["pock", "ls"]).unwrap();
    let Some(Commands::Library(args)) = cli.command else {
        panic!("expected library command");
    };
    assert_eq!(args.pages, 1);
    assert!(!args.all);
}

#[test]
fn parse_rejects_all_with_pages() {
    assert!(Cli::try_parse_from(["pock", "bestsellers", "--all", "--pages", "2"]).is_err());
    assert!(Cli::try_parse_from(["pock", "bestsellers", "--all"]).is_ok());
}

#[test]
fn parse_global_profile_after_subcommand() {
    let cli = Cli::try_parse_from(["pock", "auth", "status", "--profile", "tablet"]).unwrap();
    assert_eq!(cli.profile.as_deref(), Some("tablet"));
}

#[test]
fn resolve_page_size_prefers_flag_then_profile() {
    assert_eq!(resolve_page_size(Some(7), Some(30), 20).unwrap(), 7);
    assert_eq!(resolve_page_size(None, Some(30), 20).unwrap(), 30);
    assert_eq!(resolve_page_size(None, None, 20).unwrap(), 20);
    assert!(resolve_page_size(Some(0), None, 20).is_err());
}

#[test]
fn flag_page_size_error_does_not_blame_environment() {
    let error = resolve_page_size(Some(0), None, 20).unwrap_err();
    assert!(error.to_string().contains("Page size"));
    assert!(!error.to_string().contains("POCK_PAGE_SIZE"));
}

#[test]
fn parse_book_id_validates_uuid() {
    let id = ItemId::new();
    assert_eq!(parse_book_id(&format!("  {id} ")).unwrap(), id);
    assert!(matches!(parse_book_id("   "), Err(CliError::EmptyBookId)));
    assert!(matches!(
        parse_book_id("not-a-uuid"),
        Err(CliError::InvalidBookId(_))
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn format_size_picks_unit() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(1536), "1.5 KiB");
    assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn truncate_adds_ellipsis() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(
        truncate("This is a very long title that keeps going", 20),
        "This is a very lo..."
    );
}

#[test]
fn format_book_lines_fall_back_for_plain_items() {
    let item = Item::new(fields("Dune"));
    let lines = format_book_lines(&[item.clone()]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Dune - Tester"));

    let listed = book_to_list_item(&item);
    assert_eq!(listed.title, "Dune");
    assert_eq!(listed.size, 0);
}

#[test]
fn progress_lines_show_percentage_and_location() {
    let progress = pock_core::models::ReadingProgress {
        book_id: "b1".to_string(),
        location: Some("epubcfi(/6/4)".to_string()),
        percentage: Some(0.42),
        last_updated: 0,
    };
    let line = format_progress(&progress);
    assert!(line.contains("42%"));
    assert!(line.contains("epubcfi(/6/4)"));
}

#[test]
fn config_init_writes_and_activates_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cli-config.json");

    let name = run_config_init(
        &path,
        Some("tablet"),
        Some(PathBuf::from("/srv/books")),
        Some(50),
        false,
    )
    .unwrap();
    assert_eq!(name, "tablet");

    let config = CliProfilesConfig::load_from_path(&path).unwrap();
    assert_eq!(config.active_profile.as_deref(), Some("tablet"));
    let profile = config.profile("tablet").unwrap();
    assert_eq!(profile.storage_dir.as_deref(), Some("/srv/books"));
    assert_eq!(profile.page_size, Some(50));

    run_config_init(&path, Some("phone"), None, None, true).unwrap();
    let config = CliProfilesConfig::load_from_path(&path).unwrap();
    assert_eq!(config.active_profile.as_deref(), Some("tablet"));
    assert!(config.profile("phone").is_some());
}

#[test]
fn config_init_rejects_oversized_page_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cli-config.json");
    assert!(run_config_init(&path, Some("tablet"), None, Some(100_000), false).is_err());
    assert!(!path.exists());
}

#[test]
fn run_completions_writes_bash_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("pock.bash");

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_pock()"));
    assert!(script.contains("complete -F _pock"));
}

/// Rejects the first continuation cursor it sees, as after a truncate
struct StaleOnceCollection {
    inner: MemoryCollection,
    rejected: AtomicBool,
}

impl RemoteCollection for StaleOnceCollection {
    async fn list(&self, after: Option<&Cursor>, limit: usize) -> pock_core::Result<Page> {
        if after.is_some() && !self.rejected.swap(true, Ordering::SeqCst) {
            return Err(pock_core::Error::InvalidCursor("epoch changed".to_string()));
        }
        self.inner.list(after, limit).await
    }

    async fn get(&self, id: &ItemId) -> pock_core::Result<Option<Item>> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &ItemId) -> pock_core::Result<()> {
        self.inner.delete(id).await
    }

    async fn insert(&self, fields: Map<String, Value>) -> pock_core::Result<Item> {
        self.inner.insert(fields).await
    }
}

#[tokio::test(flavor = "current_thread")]
async fn load_pages_restarts_after_stale_cursor() {
    let collection = StaleOnceCollection {
        inner: MemoryCollection::new(),
        rejected: AtomicBool::new(false),
    };
    for index in 0..6 {
        collection.insert(fields(&format!("Book {index}"))).await.unwrap();
    }

    let (items, has_more) = load_pages(&collection, 2, Some(2)).await.unwrap();
    assert_eq!(items.len(), 4);
    assert!(has_more);
    assert_eq!(items[0].field_str("title"), Some("Book 5"));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn load_pages_respects_page_limit_and_all() {
    let db_path = unique_test_db_path();
    {
        let db = Database::open(&db_path).await.unwrap();
        let bestsellers = LibSqlCollection::new(db.connection(), CollectionPath::bestsellers());
        for index in 0..5 {
            bestsellers
                .insert(fields(&format!("Book {index}")))
                .await
                .unwrap();
        }
    }

    let db = Database::open(&db_path).await.unwrap();
    let bestsellers = LibSqlCollection::new(db.connection(), CollectionPath::bestsellers());

    let (first_two, has_more) = load_pages(&bestsellers, 2, Some(2)).await.unwrap();
    let titles = first_two
        .iter()
        .filter_map(|item| item.field_str("title"))
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["Book 4", "Book 3", "Book 2", "Book 1"]);
    assert!(has_more);

    let (everything, has_more) = load_pages(&bestsellers, 2, None).await.unwrap();
    assert_eq!(everything.len(), 5);
    assert!(!has_more);

    drop(db);
    cleanup_db_files(&db_path);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn upload_then_delete_removes_record_and_file() {
    let db_path = unique_test_db_path();
    let files = tempfile::tempdir().unwrap();
    let storage = LocalBookStorage::new(files.path().join("books"));
    let source = files.path().join("Dune.epub");
    std::fs::write(&source, vec![7u8; 4096]).unwrap();
    let user = UserIdentity::new("reader-1", "Reader", None, None).unwrap();

    let db = Database::open(&db_path).await.unwrap();
    let item = {
        let uploads =
            LibSqlCollection::new(db.connection(), CollectionPath::uploads(&user.id).unwrap());
        let uploader = Uploader::new(&storage).with_chunk_size(1024);
        let mut ratios = Vec::new();
        let item = upload_book(
            &uploader,
            &user,
            &uploads,
            &source,
            BookMetadata::new(Some("Dune".to_string()), None),
            |ratio| ratios.push(ratio),
        )
        .await
        .unwrap();
        assert_eq!(ratios.last().copied(), Some(1.0));
        assert_eq!(uploads.count().await.unwrap(), 1);
        item
    };

    let listed = book_to_list_item(&item);
    assert_eq!(listed.title, "Dune");
    assert_eq!(listed.author, "Unknown");
    assert_eq!(listed.size, 4096);
    let stored = storage
        .object_file(&pock_core::models::BookRecord::from_item(&item).unwrap().path)
        .unwrap();
    assert!(stored.exists());

    delete_upload(&user.id, &item.id, &db, &storage)
        .await
        .unwrap();
    assert!(!stored.exists());

    let error = delete_upload(&user.id, &item.id, &db, &storage)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::BookNotFound(_)));

    drop(db);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn upload_book_reports_unsupported_files() {
    let files = tempfile::tempdir().unwrap();
    let source = files.path().join("notes.txt");
    std::fs::write(&source, b"plain text").unwrap();
    let user = UserIdentity::new("reader-1", "Reader", None, None).unwrap();
    let uploads = MemoryCollection::new();
    let uploader = Uploader::new(LocalBookStorage::new(files.path().join("books")));

    let result = upload_book(
        &uploader,
        &user,
        &uploads,
        &source,
        BookMetadata::default(),
        |_| {},
    )
    .await;
    assert!(matches!(result, Err(CliError::Core(_))));
    assert!(uploads.is_empty());
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn progress_merges_partial_updates() {
    let db_path = unique_test_db_path();
    let db = Database::open(&db_path).await.unwrap();

    let empty = save_progress("reader-1", "b1", &ProgressUpdate::default(), &db).await;
    assert!(matches!(empty, Err(CliError::EmptyProgress)));

    save_progress(
        "reader-1",
        "b1",
        &ProgressUpdate {
            location: Some("page 10".to_string()),
            percentage: Some(0.1),
        },
        &db,
    )
    .await
    .unwrap();
    let merged = save_progress(
        "reader-1",
        "b1",
        &ProgressUpdate {
            location: None,
            percentage: Some(0.5),
        },
        &db,
    )
    .await
    .unwrap();
    assert_eq!(merged.location.as_deref(), Some("page 10"));
    assert_eq!(merged.percentage, Some(0.5));

    let loaded = load_progress("reader-1", "b1", &db).await.unwrap();
    assert_eq!(loaded, Some(merged));
    assert!(load_progress("reader-2", "b1", &db)
        .await
        .unwrap()
        .is_none());

    drop(db);
    cleanup_db_files(&db_path);
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("pock-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &PathBuf) {
    // On Windows, libsql can keep file handles alive briefly after drop.
    if cfg!(windows) {
        return;
    }

    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
}
