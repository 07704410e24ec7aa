//! Dashboard overview.
//!
//! Counts what the workspace knows about: vault documents by category and
//! analysis history by outcome. Used by `bidvault stats`.

use std::path::Path;

use bidvault_core::models::{ActivityRecord, ActivityStatus, Category, VaultDocument};

/// Snapshot of the dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub vault_total: usize,
    pub policies: usize,
    pub past_bids: usize,
    pub analyses: usize,
    pub completed: usize,
    pub processing: usize,
    pub questions_answered: usize,
    /// `created_ts` of the most recent analysis.
    pub last_analysis_ts: Option<i64>,
}

impl DashboardStats {
    /// Compute counters from the loaded lists (`activity` most recent first).
    pub fn from_lists(vault: &[VaultDocument], activity: &[ActivityRecord]) -> Self {
        let policies = vault
            .iter()
            .filter(|d| d.category == Category::Policy)
            .count();
        Self {
            vault_total: vault.len(),
            policies,
            past_bids: vault.len() - policies,
            analyses: activity.len(),
            completed: activity
                .iter()
                .filter(|r| r.status == ActivityStatus::Completed)
                .count(),
            processing: activity
                .iter()
                .filter(|r| r.status == ActivityStatus::Processing)
                .count(),
            questions_answered: activity
                .iter()
                .filter_map(|r| r.results.as_ref())
                .map(Vec::len)
                .sum(),
            last_analysis_ts: activity.iter().map(|r| r.created_ts).max(),
        }
    }
}

/// Print the overview to stdout.
pub fn print_stats(stats: &DashboardStats, db_path: &Path) {
    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("Bidvault Dashboard");
    println!("==================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Vault:       {} document(s)", stats.vault_total);
    println!("    Policies:  {}", stats.policies);
    println!("    Past bids: {}", stats.past_bids);
    println!();
    println!(
        "  Analyses:    {} ({} completed, {} processing)",
        stats.analyses, stats.completed, stats.processing
    );
    println!("  Questions:   {}", stats.questions_answered);
    println!(
        "  Last run:    {}",
        stats
            .last_analysis_ts
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now, e.g. "3 hours ago".
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        plural(delta / 60, "min")
    } else if delta < 86400 {
        plural(delta / 3600, "hour")
    } else if delta < 86400 * 30 {
        plural(delta / 86400, "day")
    } else {
        format_ts_iso(ts)
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
