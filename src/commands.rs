//! Command implementations behind the `bidvault` binary.
//!
//! Each command is one process: it opens the store, builds a [`Workspace`],
//! performs one operation and prints the outcome. Results go to stdout,
//! notices and logs to stderr. The session slot carries the open analysis
//! between invocations.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use bidvault_core::models::{ActivityRecord, Category, QaPair, SessionSnapshot};

use crate::completion::create_provider;
use crate::config::Config;
use crate::export::{self, ExportFormat};
use crate::migrate;
use crate::session::FileSessionCache;
use crate::sqlite_store::SqliteStore;
use crate::stats;
use crate::workflow::Workspace;

/// Open the store, wire up the workspace and load its lists.
///
/// Returns the cached session alongside, as an offer the caller may apply.
pub async fn open_workspace(cfg: &Config) -> Result<(Workspace, Option<SessionSnapshot>)> {
    let store = SqliteStore::open(&cfg.db.path)
        .await
        .with_context(|| format!("Failed to open store at {}", cfg.db.path.display()))?;
    let provider = create_provider(&cfg.completion)?;
    let session = FileSessionCache::new(&cfg.session.path);

    let workspace = Workspace::new(
        Arc::new(store),
        provider,
        Arc::new(session),
        cfg.completion.max_tender_chars,
    );
    let offer = workspace.load().await.context("Failed to load workspace")?;
    Ok((workspace, offer))
}

fn print_notice(workspace: &Workspace) {
    if let Some(notice) = workspace.take_notice() {
        eprintln!("{}", notice);
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file path: {}", path.display()))
}

fn print_results(tender: &str, results: &[QaPair]) -> Result<()> {
    println!("{}", export::render(tender, results, ExportFormat::Markdown)?);
    Ok(())
}

pub async fn run_init(cfg: &Config) -> Result<()> {
    let store = SqliteStore::open(&cfg.db.path)
        .await
        .with_context(|| format!("Failed to initialize {}", cfg.db.path.display()))?;
    let version = migrate::schema_version(store.pool()).await?;
    store.close().await;
    println!("Database initialized successfully (schema v{}).", version);
    Ok(())
}

// ─── Vault ─────────────────────────────────────────────────────────────

pub async fn run_vault_add(cfg: &Config, path: &Path, category: Category) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = file_name(path)?;

    let (workspace, _) = open_workspace(cfg).await?;
    let result = workspace.upload_to_vault(&name, &bytes, category).await;
    print_notice(&workspace);
    let doc = result?;
    println!("{}", doc.id);
    Ok(())
}

pub async fn run_vault_list(cfg: &Config, category: Option<Category>) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let docs: Vec<_> = workspace
        .vault_documents()
        .into_iter()
        .filter(|d| category.map_or(true, |c| d.category == c))
        .collect();

    if docs.is_empty() {
        println!("No documents in the vault.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>9}  {:<10}  NAME",
        "ID", "CATEGORY", "SIZE", "ADDED"
    );
    for doc in &docs {
        println!(
            "{:<36}  {:<10}  {:>9}  {:<10}  {}",
            doc.id,
            doc.category.label(),
            doc.size,
            doc.date,
            doc.name
        );
    }
    Ok(())
}

pub async fn run_vault_rm(cfg: &Config, id: &str) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let result = workspace.remove_document(id).await;
    print_notice(&workspace);
    Ok(result?)
}

pub async fn run_vault_clear(cfg: &Config) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let result = workspace.clear_vault().await;
    print_notice(&workspace);
    Ok(result?)
}

// ─── Analysis ──────────────────────────────────────────────────────────

pub async fn run_analyze(cfg: &Config, path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = file_name(path)?;

    let (workspace, _) = open_workspace(cfg).await?;
    workspace.select_file(&name, bytes)?;
    eprintln!("Analyzing {}...", name);

    let outcome = workspace.analyze().await;
    print_notice(&workspace);
    outcome.with_context(|| format!("Analysis of {} failed", name))?;

    let results = workspace.results().unwrap_or_default();
    print_results(&name, &results)
}

pub async fn run_resume(cfg: &Config, id: &str) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let resumed = workspace.resume_by_id(id)?;
    print_notice(&workspace);
    if !resumed {
        bail!("Activity {} cannot be resumed", id);
    }

    let file = workspace.current_file().map(|f| f.name).unwrap_or_default();
    print_results(&file, &workspace.results().unwrap_or_default())
}

// ─── History ───────────────────────────────────────────────────────────

pub async fn run_history_list(cfg: &Config, search: Option<&str>) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let records = workspace.recent_activity(search);

    if records.is_empty() {
        println!("No analysis history.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>4}  {:<20}  NAME",
        "ID", "STATUS", "QAS", "DATE"
    );
    for r in &records {
        println!(
            "{:<36}  {:<10}  {:>4}  {:<20}  {}",
            r.id,
            r.status.as_str(),
            r.results.as_ref().map_or(0, Vec::len),
            r.date,
            r.name
        );
    }
    Ok(())
}

fn find_record(workspace: &Workspace, id: &str) -> Result<ActivityRecord> {
    workspace
        .recent_activity(None)
        .into_iter()
        .find(|r| r.id == id)
        .with_context(|| format!("No activity record with id {}", id))
}

pub async fn run_history_show(cfg: &Config, id: &str) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let record = find_record(&workspace, id)?;

    println!("id:      {}", record.id);
    println!("name:    {}", record.name);
    println!("type:    {}", record.kind);
    println!("size:    {}", record.size);
    println!("date:    {}", record.date);
    println!("status:  {}", record.status);
    println!();
    match &record.results {
        Some(results) => print_results(&record.name, results)?,
        None => println!("(no results)"),
    }
    Ok(())
}

pub async fn run_history_rm(cfg: &Config, id: &str) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let result = workspace.delete_activity(id).await;
    print_notice(&workspace);
    Ok(result?)
}

pub async fn run_history_clear(cfg: &Config) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    let result = workspace.clear_activity().await;
    print_notice(&workspace);
    Ok(result?)
}

// ─── Session, export, dashboard ────────────────────────────────────────

pub async fn run_session_show(cfg: &Config) -> Result<()> {
    let (_, offer) = open_workspace(cfg).await?;
    match offer {
        Some(snapshot) => {
            println!(
                "Open analysis: {} ({} question(s))",
                snapshot.file.name,
                snapshot.results.len()
            );
        }
        None => println!("No open analysis."),
    }
    Ok(())
}

pub async fn run_session_reset(cfg: &Config) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    workspace.reset()?;
    println!("Session cleared.");
    Ok(())
}

pub async fn run_export(
    cfg: &Config,
    id: Option<&str>,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let (workspace, offer) = open_workspace(cfg).await?;

    let (name, results) = match id {
        Some(id) => {
            let record = find_record(&workspace, id)?;
            if !record.is_resumable() {
                bail!("Activity {} has no results to export", id);
            }
            (record.name, record.results.unwrap_or_default())
        }
        None => match offer {
            Some(snapshot) => (snapshot.file.name, snapshot.results),
            None => bail!("No open analysis to export; pass --id to export a stored record"),
        },
    };

    let rendered = export::render(&name, &results, format)?;
    export::write_export(&rendered, output)
}

pub async fn run_stats(cfg: &Config) -> Result<()> {
    let (workspace, _) = open_workspace(cfg).await?;
    stats::print_stats(&workspace.stats(), &cfg.db.path);
    Ok(())
}

pub async fn run_factory_reset(cfg: &Config, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Refusing to erase all data without --yes");
    }
    let (workspace, _) = open_workspace(cfg).await?;
    workspace.factory_reset().await?;
    println!("All vault documents, history and session data erased.");
    Ok(())
}
