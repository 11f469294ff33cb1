use std::io::{self, Write};
use std::path::Path;

use pock_core::auth::UserIdentity;
use pock_core::db::LibSqlCollection;
use pock_core::models::{BookMetadata, CollectionPath, Item};
use pock_core::paging::RemoteCollection;
use pock_core::storage::BookStorage;
use pock_core::upload::{UploadEvent, Uploader};

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_upload(
    file: &Path,
    title: Option<String>,
    author: Option<String>,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let user = ctx.require_user()?;
    let db = ctx.database().await?;
    let uploads = LibSqlCollection::new(db.connection(), CollectionPath::uploads(&user.id)?);
    let storage = ctx.storage();
    tracing::debug!("Uploading to {}", storage.describe());

    let item = upload_book(
        &Uploader::new(storage),
        &user,
        &uploads,
        file,
        BookMetadata::new(title, author),
        |ratio| {
            eprint!("\rUploading... {:>3.0}%", ratio * 100.0);
            io::stderr().flush().ok();
        },
    )
    .await;
    eprintln!();

    println!("{}", item?.id);
    Ok(())
}

/// Drive an upload to its end, reporting each progress ratio
pub async fn upload_book<S, C>(
    uploader: &Uploader<S>,
    user: &UserIdentity,
    uploads: &C,
    file: &Path,
    metadata: BookMetadata,
    mut on_progress: impl FnMut(f64),
) -> Result<Item, CliError>
where
    S: BookStorage,
    C: RemoteCollection,
{
    let mut events = uploader.upload(user, uploads, file, metadata)?;
    while let Some(event) = events.next().await {
        match event {
            UploadEvent::Progress(ratio) => on_progress(ratio),
            UploadEvent::Completed(item) => return Ok(item),
            UploadEvent::Failed(message) => return Err(CliError::UploadFailed(message)),
        }
    }
    Err(CliError::UploadFailed("upload ended without a result".to_string()))
}
