//! Render a QA list for the downstream document generator.
//!
//! Two formats: Markdown for humans and JSON (`[{question, answer}]`, the
//! same shape the completion reply is sanitized into) for tooling. Output
//! goes to a file or to stdout for piping.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

use bidvault_core::models::QaPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

#[derive(Serialize)]
struct ExportData<'a> {
    tender: &'a str,
    results: &'a [QaPair],
}

/// Render `results` for the tender named `tender`.
pub fn render(tender: &str, results: &[QaPair], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&ExportData { tender, results })?),
        ExportFormat::Markdown => {
            let mut out = format!("# Tender Response: {}\n\n", tender);
            for (i, pair) in results.iter().enumerate() {
                out.push_str(&format!(
                    "## {}. {}\n\n{}\n\n",
                    i + 1,
                    pair.question.trim(),
                    pair.answer.trim()
                ));
            }
            Ok(out)
        }
    }
}

/// Write rendered output to `output`, or stdout when `None`.
pub fn write_export(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, rendered)?;
            eprintln!("Exported to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
