//! # Bidvault CLI (`bidvault`)
//!
//! Tender response drafting from the command line: keep a vault of policy
//! documents and past bids, analyze a tender against it, and export the
//! drafted answers.
//!
//! ## Usage
//!
//! ```bash
//! bidvault --config ./config/bidvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bidvault init` | Create the SQLite database and run schema migrations |
//! | `bidvault vault add <file> --category <c>` | Extract and store a knowledge document |
//! | `bidvault vault list` | List vault documents |
//! | `bidvault analyze <file>` | Extract questions from a tender and draft answers |
//! | `bidvault history list` | Show past analyses, most recent first |
//! | `bidvault resume <id>` | Reopen a past analysis |
//! | `bidvault export` | Render the open analysis as Markdown or JSON |
//! | `bidvault stats` | Dashboard overview |
//! | `bidvault reset --yes` | Erase all local data |
//!
//! ## Examples
//!
//! ```bash
//! # Load knowledge
//! bidvault vault add ./security-policy.pdf --category policy
//! bidvault vault add ./nhs-bid-2024.docx --category past-bid
//!
//! # Draft answers (needs GEMINI_API_KEY)
//! bidvault analyze ./tender.pdf
//!
//! # Hand the answers to the document generator
//! bidvault export --format json --output ./out/response.json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bidvault::commands;
use bidvault::config;
use bidvault::export::ExportFormat;
use bidvault_core::models::Category;

/// Bidvault: draft tender responses from your own policies and past bids.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bidvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bidvault",
    about = "Bidvault: draft tender responses from your own policies and past bids",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bidvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; upgrades an older schema in place.
    Init,

    /// Manage the knowledge vault.
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },

    /// Analyze a tender document (.pdf, .docx, .xlsx, .xls, .txt).
    ///
    /// Prints the drafted answers as Markdown and keeps them as the open
    /// analysis for `export`.
    Analyze {
        /// Path to the tender document.
        file: PathBuf,
    },

    /// Browse and prune analysis history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Reopen a completed analysis from history.
    Resume {
        /// Activity record id.
        id: String,
    },

    /// Inspect or discard the open analysis.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Export answers for document generation.
    ///
    /// Exports the open analysis, or a stored record with `--id`.
    Export {
        /// Activity record id to export instead of the open analysis.
        #[arg(long)]
        id: Option<String>,

        /// Output format: `markdown` or `json`.
        #[arg(long, default_value = "markdown")]
        format: ExportFormat,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show dashboard counters.
    Stats,

    /// Erase the vault, the history and the open analysis.
    Reset {
        /// Confirm the erase.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum VaultAction {
    /// Extract a document and store it as knowledge.
    Add {
        file: PathBuf,

        /// `policy` (facts, compliance) or `past-bid` (tone, style).
        #[arg(long)]
        category: Category,
    },
    /// List vault documents.
    List {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Remove one document.
    Rm { id: String },
    /// Remove every document.
    Clear,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List analyses, most recent first.
    List {
        /// Case-insensitive filter on the file name.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one analysis and its answers.
    Show { id: String },
    /// Delete one analysis.
    Rm { id: String },
    /// Delete every analysis.
    Clear,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Show the open analysis, if any.
    Show,
    /// Discard the open analysis.
    Reset,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Vault { action } => match action {
            VaultAction::Add { file, category } => {
                commands::run_vault_add(&cfg, &file, category).await?
            }
            VaultAction::List { category } => commands::run_vault_list(&cfg, category).await?,
            VaultAction::Rm { id } => commands::run_vault_rm(&cfg, &id).await?,
            VaultAction::Clear => commands::run_vault_clear(&cfg).await?,
        },
        Commands::Analyze { file } => commands::run_analyze(&cfg, &file).await?,
        Commands::History { action } => match action {
            HistoryAction::List { search } => {
                commands::run_history_list(&cfg, search.as_deref()).await?
            }
            HistoryAction::Show { id } => commands::run_history_show(&cfg, &id).await?,
            HistoryAction::Rm { id } => commands::run_history_rm(&cfg, &id).await?,
            HistoryAction::Clear => commands::run_history_clear(&cfg).await?,
        },
        Commands::Resume { id } => commands::run_resume(&cfg, &id).await?,
        Commands::Session { action } => match action {
            SessionAction::Show => commands::run_session_show(&cfg).await?,
            SessionAction::Reset => commands::run_session_reset(&cfg).await?,
        },
        Commands::Export { id, format, output } => {
            commands::run_export(&cfg, id.as_deref(), format, output.as_deref()).await?
        }
        Commands::Stats => commands::run_stats(&cfg).await?,
        Commands::Reset { yes } => commands::run_factory_reset(&cfg, yes).await?,
    }

    Ok(())
}
