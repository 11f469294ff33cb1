use pock_core::db::{Database, LibSqlProgressRepository, ProgressRepository};
use pock_core::models::{ProgressUpdate, ReadingProgress};

use crate::cli::ProgressCommands;
use crate::commands::common::{format_timestamp, parse_book_id, CliContext};
use crate::error::CliError;

pub async fn run_progress(command: ProgressCommands, ctx: &CliContext) -> Result<(), CliError> {
    let user = ctx.require_user()?;
    let db = ctx.database().await?;
    match command {
        ProgressCommands::Show { book_id, json } => {
            let book_id = parse_book_id(&book_id)?.to_string();
            let progress = load_progress(&user.id, &book_id, &db).await?;
            match (progress, json) {
                (Some(progress), true) => println!("{}", serde_json::to_string_pretty(&progress)?),
                (Some(progress), false) => println!("{}", format_progress(&progress)),
                (None, true) => println!("null"),
                (None, false) => println!("No progress saved for {book_id}"),
            }
            Ok(())
        }
        ProgressCommands::Set {
            book_id,
            location,
            percentage,
        } => {
            let book_id = parse_book_id(&book_id)?.to_string();
            let update = ProgressUpdate {
                location,
                percentage,
            };
            let progress = save_progress(&user.id, &book_id, &update, &db).await?;
            println!("{}", format_progress(&progress));
            Ok(())
        }
    }
}

pub async fn load_progress(
    user_id: &str,
    book_id: &str,
    db: &Database,
) -> Result<Option<ReadingProgress>, CliError> {
    Ok(LibSqlProgressRepository::new(db.connection())
        .get(user_id, book_id)
        .await?)
}

pub async fn save_progress(
    user_id: &str,
    book_id: &str,
    update: &ProgressUpdate,
    db: &Database,
) -> Result<ReadingProgress, CliError> {
    if update.is_empty() {
        return Err(CliError::EmptyProgress);
    }
    Ok(LibSqlProgressRepository::new(db.connection())
        .save(user_id, book_id, update)
        .await?)
}

pub fn format_progress(progress: &ReadingProgress) -> String {
    let percentage = progress
        .percentage
        .map_or_else(|| "-".to_string(), |value| format!("{:.0}%", value * 100.0));
    let location = progress.location.as_deref().unwrap_or("-");
    format!(
        "{}  {percentage:>4}  at {location}  (saved {})",
        progress.book_id,
        format_timestamp(progress.last_updated)
    )
}
