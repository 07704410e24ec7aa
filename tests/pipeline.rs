//! On-disk pipeline tests: SQLite store, file session slot and real
//! extraction, wired together the way the binary wires them.

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use bidvault::db;
use bidvault::extract::extract_text;
use bidvault::migrate::{self, SCHEMA_VERSION};
use bidvault::session::FileSessionCache;
use bidvault::sqlite_store::SqliteStore;
use bidvault::workflow::{AnalyzeOutcome, Workspace, WorkflowState};
use bidvault_core::completion::{CompletionProvider, DEFAULT_MAX_TENDER_CHARS};
use bidvault_core::models::{Category, FileKind};
use bidvault_core::session::SessionCache;
use bidvault_core::store::Store;
use bidvault_core::{Error, Result};

struct Fixed;

#[async_trait]
impl CompletionProvider for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _system_instruction: &str, _prompt: &str) -> Result<String> {
        Ok("Here you go:\n```json\n[{\"question\":\"Describe your security accreditation.\",\"answer\":\"We hold ISO 27001. [Source: policy.docx]\"}]\n```".to_string())
    }
}

/// Minimal one-page PDF showing `phrase` in Helvetica, with a correct xref table.
fn pdf_with_text(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", phrase);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!("<< /Length {} >> stream\n{}\nendstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        write!(
            zip,
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        )
        .unwrap();
        zip.finish().unwrap();
    }
    buf
}

async fn open_workspace(root: &Path) -> (Workspace, Option<bidvault_core::models::SessionSnapshot>) {
    let store = SqliteStore::open(&root.join("data/bidvault.sqlite"))
        .await
        .unwrap();
    let workspace = Workspace::new(
        Arc::new(store),
        Arc::new(Fixed),
        Arc::new(FileSessionCache::new(root.join("data/session.json"))),
        DEFAULT_MAX_TENDER_CHARS,
    );
    let offer = workspace.load().await.unwrap();
    (workspace, offer)
}

#[test]
fn pdf_text_is_extracted_per_page() {
    let text = extract_text("tender.pdf", &pdf_with_text("Describe your security accreditation")).unwrap();
    assert!(text.starts_with("[Page 1]\n"), "got: {:?}", text);
    assert!(text.contains("accreditation"));
}

#[tokio::test]
async fn analysis_survives_a_restart() {
    let tmp = TempDir::new().unwrap();

    let record_id = {
        let (workspace, offer) = open_workspace(tmp.path()).await;
        assert!(offer.is_none());

        workspace
            .upload_to_vault(
                "policy.docx",
                &docx_with_paragraphs(&["We are ISO 27001 certified.", "Audited yearly."]),
                Category::Policy,
            )
            .await
            .unwrap();
        workspace
            .select_file("tender.pdf", pdf_with_text("Describe your security accreditation"))
            .unwrap();
        match workspace.analyze().await.unwrap() {
            AnalyzeOutcome::Completed(record) => record.id,
            AnalyzeOutcome::Ignored => panic!("ignored"),
        }
    };

    // A fresh process sees the vault, the history and the open session.
    let (workspace, offer) = open_workspace(tmp.path()).await;
    let docs = workspace.vault_documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].kind, FileKind::Docx);
    assert_eq!(docs[0].content, "We are ISO 27001 certified.\n\nAudited yearly.");

    let history = workspace.recent_activity(None);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, record_id);
    assert_eq!(history[0].kind, FileKind::Pdf);

    let snapshot = offer.expect("session slot should be offered");
    assert_eq!(snapshot.file.name, "tender.pdf");
    workspace.restore_session(snapshot).unwrap();
    assert_eq!(workspace.state(), WorkflowState::Resulted);
    assert!(workspace.results().unwrap()[0].answer.contains("ISO 27001"));
}

#[tokio::test]
async fn factory_reset_on_disk() {
    let tmp = TempDir::new().unwrap();
    let (workspace, _) = open_workspace(tmp.path()).await;
    workspace
        .upload_to_vault("bid.txt", b"Our previous NHS bid.", Category::PastBid)
        .await
        .unwrap();
    workspace
        .select_file("tender.txt", b"Q1: What is your pricing model?".to_vec())
        .unwrap();
    workspace.analyze().await.unwrap();

    workspace.factory_reset().await.unwrap();

    let (workspace, offer) = open_workspace(tmp.path()).await;
    assert!(offer.is_none());
    assert!(workspace.vault_documents().is_empty());
    assert!(workspace.recent_activity(None).is_empty());
    assert!(!tmp.path().join("data/session.json").exists());
}

#[tokio::test]
async fn older_schema_is_upgraded_without_touching_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("legacy.sqlite");

    // A first-generation store: vault table only, unversioned.
    {
        let pool = db::connect(&path).await.unwrap();
        sqlx::query(
            "CREATE TABLE vault (id TEXT PRIMARY KEY, name TEXT NOT NULL, content TEXT NOT NULL, \
             category TEXT NOT NULL, size TEXT NOT NULL, date TEXT NOT NULL, status TEXT NOT NULL, \
             kind TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO vault VALUES ('v1', 'old.txt', 'legacy policy', 'POLICY', '0.00 MB', \
             '01/01/2024', 'INDEXED', 'txt')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let store = SqliteStore::open(&path).await.unwrap();
    assert_eq!(migrate::schema_version(store.pool()).await.unwrap(), SCHEMA_VERSION);
    let vault = store.all_vault().await.unwrap();
    assert_eq!(vault.len(), 1);
    assert_eq!(vault[0].content, "legacy policy");
    assert!(store.all_activity().await.unwrap().is_empty());
    store.close().await;

    // Opening again is a no-op.
    let store = SqliteStore::open(&path).await.unwrap();
    assert_eq!(store.all_vault().await.unwrap().len(), 1);
    store.close().await;
}

#[tokio::test]
async fn newer_schema_is_refused() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("future.sqlite");
    {
        let pool = db::connect(&path).await.unwrap();
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1))
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let err = match SqliteStore::open(&path).await {
        Ok(_) => panic!("newer schema should be refused"),
        Err(e) => e,
    };
    assert!(matches!(err, Error::StoreUnavailable(_)));
}

#[tokio::test]
async fn corrupt_session_file_is_ignored_on_load() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("data")).unwrap();
    std::fs::write(tmp.path().join("data/session.json"), "{\"file\": 3").unwrap();

    let (workspace, offer) = open_workspace(tmp.path()).await;
    assert!(offer.is_none());
    assert_eq!(workspace.state(), WorkflowState::Idle);

    // The next save overwrites the bad slot.
    let cache = FileSessionCache::new(tmp.path().join("data/session.json"));
    cache.clear().unwrap();
    assert!(cache.load().unwrap().is_none());
}
