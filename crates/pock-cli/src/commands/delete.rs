use pock_core::db::{Database, LibSqlCollection};
use pock_core::models::CollectionPath;
use pock_core::services::delete_book_record;
use pock_core::storage::BookStorage;
use pock_core::ItemId;

use crate::commands::common::{parse_book_id, CliContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, ctx: &CliContext) -> Result<(), CliError> {
    let user = ctx.require_user()?;
    let id = parse_book_id(id)?;
    let db = ctx.database().await?;
    delete_upload(&user.id, &id, &db, &ctx.storage()).await?;
    println!("{id}");
    Ok(())
}

/// Delete one of `user_id`'s uploads along with its stored file
pub async fn delete_upload<S: BookStorage>(
    user_id: &str,
    id: &ItemId,
    db: &Database,
    storage: &S,
) -> Result<(), CliError> {
    let uploads = LibSqlCollection::new(db.connection(), CollectionPath::uploads(user_id)?);

    delete_book_record(&uploads, storage, id).await.map_err(|error| match error {
        pock_core::Error::NotFound(_) => CliError::BookNotFound(id.to_string()),
        other => CliError::Core(other),
    })
}
