//! Core data models used throughout Bidvault.
//!
//! These types represent the knowledge-base documents, analysis records and
//! question/answer pairs that flow through the ingestion and analysis
//! pipeline. All of them serialize with `serde` so the SQLite backend and
//! the session cache share one representation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Knowledge-base partition a vault document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Factual compliance material (certifications, security standards).
    Policy,
    /// Previously submitted responses, used for tone and style.
    PastBid,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Policy => "POLICY",
            Category::PastBid => "PAST_BID",
        }
    }

    /// Human label used in notices ("Policies", "Past Bids").
    pub fn label(&self) -> &'static str {
        match self {
            Category::Policy => "Policies",
            Category::PastBid => "Past Bids",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "POLICY" => Ok(Category::Policy),
            "PAST_BID" => Ok(Category::PastBid),
            other => Err(format!(
                "unknown category '{}': expected POLICY or PAST_BID",
                other
            )),
        }
    }
}

/// Indexing state of a vault document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexStatus {
    Indexed,
    Processing,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Indexed => "INDEXED",
            IndexStatus::Processing => "PROCESSING",
        }
    }
}

impl FromStr for IndexStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INDEXED" => Ok(IndexStatus::Indexed),
            "PROCESSING" => Ok(IndexStatus::Processing),
            other => Err(format!("unknown index status '{}'", other)),
        }
    }
}

/// File kind inferred from the extension of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    Pdf,
    Docx,
    Xlsx,
    Txt,
}

impl FileKind {
    /// Extensions accepted at the file-input boundary.
    pub const SUPPORTED_EXTENSIONS: [&'static str; 5] = ["pdf", "docx", "xlsx", "xls", "txt"];

    /// Infer the kind from a lower- or mixed-case extension (no leading dot).
    ///
    /// Legacy `.xls` workbooks share the `XLSX` kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "xlsx" | "xls" => Some(FileKind::Xlsx),
            "txt" => Some(FileKind::Txt),
            _ => None,
        }
    }

    /// Infer the kind from a file name, failing with [`Error::UnsupportedFormat`].
    pub fn from_file_name(name: &str) -> Result<Self, Error> {
        let ext = file_extension(name);
        FileKind::from_extension(&ext).ok_or_else(|| Error::UnsupportedFormat {
            file: name.to_string(),
            extension: ext,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Docx => "DOCX",
            FileKind::Xlsx => "XLSX",
            FileKind::Txt => "TXT",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileKind::from_extension(s).ok_or_else(|| format!("unknown file kind '{}'", s))
    }
}

/// Lower-cased extension of `name` (text after the last `.`), or empty.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Outcome state of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Completed,
    Processing,
    Pending,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Completed => "COMPLETED",
            ActivityStatus::Processing => "PROCESSING",
            ActivityStatus::Pending => "PENDING",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(ActivityStatus::Completed),
            "PROCESSING" => Ok(ActivityStatus::Processing),
            "PENDING" => Ok(ActivityStatus::Pending),
            other => Err(format!("unknown activity status '{}'", other)),
        }
    }
}

/// One extracted question and its generated answer.
///
/// Order within a list is document order and is preserved end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A piece of reference knowledge stored in the vault collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultDocument {
    pub id: String,
    pub name: String,
    pub content: String,
    pub category: Category,
    /// Human-readable size, e.g. `"0.12 MB"`.
    pub size: String,
    /// Human-readable creation date, e.g. `"17/10/2026"`.
    pub date: String,
    pub status: IndexStatus,
    pub kind: FileKind,
}

impl VaultDocument {
    /// Build a freshly indexed document with a new id and today's date.
    pub fn new(
        name: &str,
        content: String,
        category: Category,
        size_bytes: u64,
        kind: FileKind,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            content,
            category,
            size: format_size(size_bytes),
            date: format_date(&Local::now()),
            status: IndexStatus::Indexed,
            kind,
        }
    }
}

/// The persisted outcome of one tender analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub name: String,
    pub kind: FileKind,
    pub size: String,
    /// Human-readable timestamp, e.g. `"17/10/2026, 14:03:11"`.
    pub date: String,
    /// Unix seconds; backs the creation-date index.
    pub created_ts: i64,
    pub status: ActivityStatus,
    /// Present iff `status` is `COMPLETED`.
    pub results: Option<Vec<QaPair>>,
}

impl ActivityRecord {
    /// Build a `COMPLETED` record for a successful run.
    pub fn completed(file: &FileDescriptor, results: Vec<QaPair>) -> Self {
        let now = Local::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: file.name.clone(),
            kind: file.kind,
            size: format_size(file.size_bytes),
            date: format_timestamp(&now),
            created_ts: now.timestamp(),
            status: ActivityStatus::Completed,
            results: Some(results),
        }
    }

    /// A record can be resumed only when it completed with at least one pair.
    pub fn is_resumable(&self) -> bool {
        self.status == ActivityStatus::Completed
            && self.results.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// Minimal description of the file currently open in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size_bytes: u64,
    pub kind: FileKind,
}

/// Device-local snapshot of the currently open analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub file: FileDescriptor,
    pub results: Vec<QaPair>,
}

/// Format a byte count the way the vault and history lists show it.
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

fn format_date(dt: &DateTime<Local>) -> String {
    dt.format("%d/%m/%Y").to_string()
}

fn format_timestamp(dt: &DateTime<Local>) -> String {
    dt.format("%d/%m/%Y, %H:%M:%S").to_string()
}
