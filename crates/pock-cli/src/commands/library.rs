use pock_core::db::LibSqlCollection;
use pock_core::models::CollectionPath;
use pock_core::paging::RemoteCollection;
use pock_core::{FetchOutcome, Item, PagedCollectionSync};

use crate::cli::PageArgs;
use crate::commands::common::{book_to_list_item, format_book_lines, BookListItem, CliContext};
use crate::error::CliError;

/// Which collection a listing command shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listing {
    Library,
    ReadingList,
    Bestsellers,
}

pub async fn run_listing(
    listing: Listing,
    args: &PageArgs,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let path = match listing {
        Listing::Library => CollectionPath::uploads(&ctx.require_user()?.id)?,
        Listing::ReadingList => CollectionPath::reading_list(&ctx.require_user()?.id)?,
        Listing::Bestsellers => CollectionPath::bestsellers(),
    };
    let page_size = ctx.page_size(args.page_size)?;
    let pages = if args.all { None } else { Some(args.pages) };

    let db = ctx.database().await?;
    let collection = LibSqlCollection::new(db.connection(), path);
    let (items, has_more) = load_pages(&collection, page_size, pages).await?;

    if args.json {
        let json_items = items
            .iter()
            .map(book_to_list_item)
            .collect::<Vec<BookListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        if items.is_empty() {
            println!("No books yet.");
        }
        for line in format_book_lines(&items) {
            println!("{line}");
        }
        if has_more {
            println!("(more available: pass --pages or --all)");
        }
    }

    Ok(())
}

/// Page through a collection. `None` loads until exhausted.
///
/// A rejected cursor restarts the window from the first page once.
pub async fn load_pages<C: RemoteCollection>(
    collection: &C,
    page_size: usize,
    pages: Option<usize>,
) -> Result<(Vec<Item>, bool), CliError> {
    let sync = PagedCollectionSync::with_page_size(collection, page_size)?;
    let mut loaded = 0usize;
    let mut restarted = false;

    while sync.has_more() && !pages.is_some_and(|limit| loaded >= limit) {
        match sync.fetch_next().await {
            Ok(FetchOutcome::Applied { appended }) => {
                tracing::debug!(appended, "Loaded page {}", loaded + 1);
                loaded += 1;
            }
            Ok(FetchOutcome::Skipped | FetchOutcome::Discarded) => break,
            Err(error) if error.requires_refresh() && !restarted => {
                tracing::warn!("{}; reloading from the first page", error);
                restarted = true;
                loaded = 1;
                sync.refresh().await?;
            }
            Err(error) => return Err(error.into()),
        }
    }

    let state = sync.state();
    Ok((state.window, state.has_more))
}
