//! Pock CLI - Command-line interface for your e-book library
//!
//! Upload books, page through collections and keep reading progress.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::library::{run_listing, Listing};
use crate::commands::progress::run_progress;
use crate::commands::upload::run_upload;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pock=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();
    let load_context = |db_path| CliContext::load(db_path, profile);

    match cli.command {
        Some(Commands::Auth { command }) => {
            run_auth(command, &load_context(cli.db_path)?).await?;
        }
        Some(Commands::Upload {
            file,
            title,
            author,
        }) => {
            run_upload(&file, title, author, &load_context(cli.db_path)?).await?;
        }
        Some(Commands::Library(args)) => {
            run_listing(Listing::Library, &args, &load_context(cli.db_path)?).await?;
        }
        Some(Commands::ReadingList(args)) => {
            run_listing(Listing::ReadingList, &args, &load_context(cli.db_path)?).await?;
        }
        Some(Commands::Bestsellers(args)) => {
            run_listing(Listing::Bestsellers, &args, &load_context(cli.db_path)?).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, &load_context(cli.db_path)?).await?,
        Some(Commands::Progress { command }) => {
            run_progress(command, &load_context(cli.db_path)?).await?;
        }
        Some(Commands::Config { command }) => run_config(command, profile, cli.db_path)?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
