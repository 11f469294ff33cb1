use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "pock")]
#[command(about = "Upload, browse and track your e-book library")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for session and storage configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, inspect or clear the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Upload an EPUB or PDF to your library
    Upload {
        /// Book file (.epub or .pdf)
        file: PathBuf,
        /// Book title (defaults to "Unknown")
        #[arg(long)]
        title: Option<String>,
        /// Book author (defaults to "Unknown")
        #[arg(long)]
        author: Option<String>,
    },
    /// List books you uploaded
    #[command(alias = "ls")]
    Library(PageArgs),
    /// List your reading list
    ReadingList(PageArgs),
    /// List the shared bestsellers feed
    Bestsellers(PageArgs),
    /// Delete an uploaded book
    #[command(alias = "rm")]
    Delete {
        /// Book ID
        id: String,
    },
    /// Show or save reading progress
    Progress {
        #[command(subcommand)]
        command: ProgressCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageArgs {
    /// Items per page (overrides profile and POCK_PAGE_SIZE)
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,
    /// Number of pages to load
    #[arg(long, default_value = "1", value_name = "N")]
    pub pages: usize,
    /// Load every page
    #[arg(long, conflicts_with = "pages")]
    pub all: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store a session obtained from the identity provider
    Login {
        /// Provider user ID
        #[arg(long, value_name = "ID")]
        id: String,
        /// Display name
        #[arg(long, value_name = "NAME")]
        name: String,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,
        /// Profile photo URL
        #[arg(long, value_name = "URL")]
        photo_url: Option<String>,
        /// ID token issued by the provider
        #[arg(long, value_name = "TOKEN")]
        token: String,
        /// Seconds until the token expires (never when omitted)
        #[arg(long, value_name = "SECONDS")]
        expires_in: Option<i64>,
    },
    /// Show who is signed in
    Status,
    /// Clear the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum ProgressCommands {
    /// Show saved progress for a book
    Show {
        /// Book ID
        book_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save progress for a book; omitted fields keep their saved values
    Set {
        /// Book ID
        book_id: String,
        /// Reader location (EPUB CFI or page)
        #[arg(long)]
        location: Option<String>,
        /// Fraction read, between 0 and 1
        #[arg(long)]
        percentage: Option<f64>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Directory for locally stored books
        #[arg(long, value_name = "PATH")]
        storage_dir: Option<PathBuf>,
        /// Default page size for listings
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved configuration
    Show,
}
