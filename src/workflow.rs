//! The analysis workspace: a single-flight, resumable state machine.
//!
//! ```text
//!            select_file                analyze (in flight)
//!   Idle ───────────────▶ FileSelected ───────────────▶ Analyzing
//!    ▲                      ▲    │                         │
//!    │ reset                │    └──── failure ◀───────────┤
//!    │                      │                              │ success
//!    └──────────────────────┴──────── Resulted ◀───────────┘
//!                                        ▲
//!              resume / restore_session ─┘  (from Idle, FileSelected, Resulted)
//! ```
//!
//! A [`Workspace`] owns the in-memory views (current selection, displayed
//! results, vault and history lists) but never the source of truth: every
//! list is loaded from, and written through to, the injected [`Store`]. The
//! session slot mirrors the open analysis and is only consulted at start-up.
//!
//! Methods take `&self`; state sits behind a mutex that is never held across
//! an `.await`, so overlapping calls observe each other's transitions. A
//! second [`Workspace::analyze`] while one is in flight is ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bidvault_core::completion::{complete, CompletionProvider};
use bidvault_core::context::assemble_context;
use bidvault_core::error::{Error, Result};
use bidvault_core::models::{
    ActivityRecord, Category, FileDescriptor, FileKind, QaPair, SessionSnapshot, VaultDocument,
};
use bidvault_core::session::SessionCache;
use bidvault_core::store::Store;

use crate::extract::extract_text;
use crate::stats::DashboardStats;

/// Tender text shorter than this (after trimming) is treated as unreadable.
const MIN_TENDER_CHARS: usize = 10;

/// Observable phase of the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    FileSelected,
    Analyzing,
    Resulted,
}

/// Result of an [`Workspace::analyze`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome {
    /// The run finished and this record was persisted.
    Completed(ActivityRecord),
    /// Nothing to do: no file selected, results already shown, or a run is in flight.
    Ignored,
}

#[derive(Clone)]
struct SelectedFile {
    descriptor: FileDescriptor,
    bytes: Arc<Vec<u8>>,
}

enum Slot {
    Idle,
    Selected(SelectedFile),
    Analyzing(SelectedFile),
    Resulted {
        file: FileDescriptor,
        results: Vec<QaPair>,
    },
}

struct Inner {
    slot: Slot,
    vault: Vec<VaultDocument>,
    activity: Vec<ActivityRecord>,
    last_error: Option<String>,
    notice: Option<String>,
}

/// The analysis workspace. See the module docs for the state machine.
pub struct Workspace {
    store: Arc<dyn Store>,
    provider: Arc<dyn CompletionProvider>,
    session: Arc<dyn SessionCache>,
    max_tender_chars: usize,
    inner: Mutex<Inner>,
}

impl Workspace {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn CompletionProvider>,
        session: Arc<dyn SessionCache>,
        max_tender_chars: usize,
    ) -> Self {
        Self {
            store,
            provider,
            session,
            max_tender_chars,
            inner: Mutex::new(Inner {
                slot: Slot::Idle,
                vault: Vec::new(),
                activity: Vec::new(),
                last_error: None,
                notice: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(notice = %message);
        self.lock().notice = Some(message);
    }

    // ─── Start-up ──────────────────────────────────────────────────────

    /// Load the vault and history lists from the store.
    ///
    /// Returns the cached session, if any, as an offer to restore; it is
    /// not applied until [`restore_session`](Self::restore_session).
    pub async fn load(&self) -> Result<Option<SessionSnapshot>> {
        let vault = self.store.all_vault().await?;
        let activity = self.store.all_activity().await?;
        tracing::info!(
            vault = vault.len(),
            activity = activity.len(),
            "workspace loaded"
        );
        {
            let mut inner = self.lock();
            inner.vault = vault;
            inner.activity = activity;
        }

        match self.session.load() {
            Ok(snapshot) => Ok(snapshot.filter(|s| !s.results.is_empty())),
            Err(e) => {
                tracing::warn!(error = %e, "session slot unreadable");
                Ok(None)
            }
        }
    }

    /// Reopen a cached session, jumping straight to `Resulted`.
    pub fn restore_session(&self, snapshot: SessionSnapshot) -> Result<()> {
        let mut inner = self.lock();
        if matches!(inner.slot, Slot::Analyzing(_)) {
            return Err(Error::Busy);
        }
        tracing::info!(file = %snapshot.file.name, "restoring previous session");
        inner.slot = Slot::Resulted {
            file: snapshot.file,
            results: snapshot.results,
        };
        inner.last_error = None;
        Ok(())
    }

    // ─── Analysis state machine ────────────────────────────────────────

    /// Validate and select a tender file (`Idle → FileSelected`).
    ///
    /// An unsupported extension leaves the workspace `Idle` and records the
    /// error.
    pub fn select_file(&self, name: &str, bytes: Vec<u8>) -> Result<FileDescriptor> {
        let mut inner = self.lock();
        if matches!(inner.slot, Slot::Analyzing(_)) {
            return Err(Error::Busy);
        }

        let kind = match FileKind::from_file_name(name) {
            Ok(kind) => kind,
            Err(e) => {
                inner.slot = Slot::Idle;
                inner.last_error = Some(e.to_string());
                drop(inner);
                self.notify(e.to_string());
                return Err(e);
            }
        };

        let descriptor = FileDescriptor {
            name: name.to_string(),
            size_bytes: bytes.len() as u64,
            kind,
        };
        inner.slot = Slot::Selected(SelectedFile {
            descriptor: descriptor.clone(),
            bytes: Arc::new(bytes),
        });
        inner.last_error = None;
        tracing::info!(file = name, kind = %kind, "file selected");
        Ok(descriptor)
    }

    /// Run extraction, context assembly, completion and persistence for the
    /// selected file (`FileSelected → Analyzing → Resulted`).
    ///
    /// On failure the file stays selected, the message is kept in
    /// [`last_error`](Self::last_error) and raised as a notice. Calls made while not in
    /// `FileSelected` (including while another run is in flight) return
    /// [`AnalyzeOutcome::Ignored`].
    pub async fn analyze(&self) -> Result<AnalyzeOutcome> {
        let file = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.slot, Slot::Idle) {
                Slot::Selected(file) => {
                    inner.slot = Slot::Analyzing(file.clone());
                    inner.last_error = None;
                    file
                }
                other => {
                    inner.slot = other;
                    tracing::debug!("analyze ignored: nothing selected or run in flight");
                    return Ok(AnalyzeOutcome::Ignored);
                }
            }
        };

        tracing::info!(file = %file.descriptor.name, "analysis started");
        match self.run_analysis(&file).await {
            Ok(record) => {
                let results = record.results.clone().unwrap_or_default();
                let snapshot = SessionSnapshot {
                    file: file.descriptor.clone(),
                    results: results.clone(),
                };
                if let Err(e) = self.session.save(&snapshot) {
                    tracing::warn!(error = %e, "could not write session slot");
                }
                {
                    let mut inner = self.lock();
                    inner.activity.insert(0, record.clone());
                    inner.slot = Slot::Resulted {
                        file: file.descriptor,
                        results,
                    };
                }
                self.notify("Tender analysis complete!");
                Ok(AnalyzeOutcome::Completed(record))
            }
            Err(e) => {
                tracing::warn!(
                    file = %file.descriptor.name,
                    error = %e,
                    retryable = e.is_transient(),
                    "analysis failed"
                );
                {
                    let mut inner = self.lock();
                    inner.slot = Slot::Selected(file);
                    inner.last_error = Some(e.to_string());
                }
                self.notify(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_analysis(&self, file: &SelectedFile) -> Result<ActivityRecord> {
        let name = &file.descriptor.name;

        let tender_text = extract_text(name, &file.bytes)?;
        if tender_text.trim().chars().count() < MIN_TENDER_CHARS {
            return Err(Error::EmptyDocument { file: name.clone() });
        }

        // The vault is read once here; later uploads or deletes do not
        // affect this run.
        let context = assemble_context(self.store.as_ref()).await?;

        let results = complete(
            self.provider.as_ref(),
            &tender_text,
            &context,
            self.max_tender_chars,
        )
        .await?;
        if results.is_empty() {
            return Err(Error::MalformedResponse(
                "the reply contained no question/answer pairs".to_string(),
            ));
        }

        let record = ActivityRecord::completed(&file.descriptor, results);
        self.store.put_activity(&record).await?;
        tracing::info!(
            id = %record.id,
            pairs = record.results.as_ref().map_or(0, Vec::len),
            "analysis persisted"
        );
        Ok(record)
    }

    /// Discard the selection and results and empty the session slot.
    pub fn reset(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            if matches!(inner.slot, Slot::Analyzing(_)) {
                return Err(Error::Busy);
            }
            inner.slot = Slot::Idle;
            inner.last_error = None;
        }
        if let Err(e) = self.session.clear() {
            tracing::warn!(error = %e, "could not clear session slot");
        }
        tracing::info!("workspace reset");
        Ok(())
    }

    /// Reopen a persisted record's results, bypassing extraction and completion.
    ///
    /// Returns `Ok(false)` with a notice, leaving the state unchanged, when
    /// the record did not complete or has no results.
    pub fn resume(&self, record: &ActivityRecord) -> Result<bool> {
        if !record.is_resumable() {
            self.notify("Cannot resume: No analysis data found for this document.");
            return Ok(false);
        }
        let results = record.results.clone().unwrap_or_default();
        let file = FileDescriptor {
            name: record.name.clone(),
            size_bytes: 0,
            kind: record.kind,
        };

        {
            let mut inner = self.lock();
            if matches!(inner.slot, Slot::Analyzing(_)) {
                return Err(Error::Busy);
            }
            inner.slot = Slot::Resulted {
                file: file.clone(),
                results: results.clone(),
            };
            inner.last_error = None;
        }

        if let Err(e) = self.session.save(&SessionSnapshot { file, results }) {
            tracing::warn!(error = %e, "could not write session slot");
        }
        tracing::info!(id = %record.id, "resumed analysis");
        Ok(true)
    }

    /// [`resume`](Self::resume) a record from the loaded history by id.
    pub fn resume_by_id(&self, id: &str) -> Result<bool> {
        let record = self.lock().activity.iter().find(|r| r.id == id).cloned();
        match record {
            Some(record) => self.resume(&record),
            None => {
                self.notify(format!("Cannot resume: no activity record with id {}.", id));
                Ok(false)
            }
        }
    }

    // ─── Vault upload (independent of the state machine) ───────────────

    /// Extract, validate and persist a knowledge document.
    pub async fn upload_to_vault(
        &self,
        name: &str,
        bytes: &[u8],
        category: Category,
    ) -> Result<VaultDocument> {
        match self.try_upload(name, bytes, category).await {
            Ok(doc) => {
                self.lock().vault.push(doc.clone());
                self.notify(format!("Document added to {}", category.label()));
                Ok(doc)
            }
            Err(e) => {
                self.notify(format!("Failed to upload: {}", e));
                Err(e)
            }
        }
    }

    async fn try_upload(
        &self,
        name: &str,
        bytes: &[u8],
        category: Category,
    ) -> Result<VaultDocument> {
        let kind = FileKind::from_file_name(name)?;
        let text = extract_text(name, bytes)?;
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument {
                file: name.to_string(),
            });
        }
        let doc = VaultDocument::new(name, text, category, bytes.len() as u64, kind);
        self.store.put_vault(&doc).await?;
        tracing::info!(id = %doc.id, name, category = %category, "vault document indexed");
        Ok(doc)
    }

    // ─── Deletion and clearing (direct store pass-throughs) ───────────

    pub async fn remove_document(&self, id: &str) -> Result<()> {
        self.lock().vault.retain(|d| d.id != id);
        match self.store.delete_vault(id).await {
            Ok(()) => {
                self.notify("Document removed from Vault.");
                Ok(())
            }
            Err(e) => self.correct_after_failure("Failed to delete document.", e).await,
        }
    }

    pub async fn clear_vault(&self) -> Result<()> {
        self.lock().vault.clear();
        match self.store.clear_vault().await {
            Ok(()) => {
                self.notify("All documents cleared from Vault.");
                Ok(())
            }
            Err(e) => self.correct_after_failure("Failed to clear Vault.", e).await,
        }
    }

    pub async fn delete_activity(&self, id: &str) -> Result<()> {
        self.lock().activity.retain(|r| r.id != id);
        match self.store.delete_activity(id).await {
            Ok(()) => {
                self.notify("Activity removed from history.");
                Ok(())
            }
            Err(e) => self.correct_after_failure("Failed to remove activity.", e).await,
        }
    }

    pub async fn clear_activity(&self) -> Result<()> {
        self.lock().activity.clear();
        match self.store.clear_activity().await {
            Ok(()) => {
                self.notify("All activity history cleared.");
                Ok(())
            }
            Err(e) => self.correct_after_failure("Failed to clear history.", e).await,
        }
    }

    /// Report a failed delete and re-read the lists so memory matches the store again.
    async fn correct_after_failure(&self, message: &str, err: Error) -> Result<()> {
        tracing::warn!(error = %err, "{}", message);
        self.notify(message);
        match (self.store.all_vault().await, self.store.all_activity().await) {
            (Ok(vault), Ok(activity)) => {
                let mut inner = self.lock();
                inner.vault = vault;
                inner.activity = activity;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "could not re-read the store; lists may be stale");
            }
        }
        Err(err)
    }

    /// Clear both collections and the session slot, then return to `Idle`.
    ///
    /// The two clears are separate commits; if the second fails the vault
    /// is already empty.
    pub async fn factory_reset(&self) -> Result<()> {
        if self.state() == WorkflowState::Analyzing {
            return Err(Error::Busy);
        }
        self.clear_vault().await?;
        self.clear_activity().await?;
        self.session.clear()?;
        {
            let mut inner = self.lock();
            inner.slot = Slot::Idle;
            inner.last_error = None;
        }
        tracing::info!("factory reset complete");
        Ok(())
    }

    // ─── Views ─────────────────────────────────────────────────────────

    pub fn state(&self) -> WorkflowState {
        match self.lock().slot {
            Slot::Idle => WorkflowState::Idle,
            Slot::Selected(_) => WorkflowState::FileSelected,
            Slot::Analyzing(_) => WorkflowState::Analyzing,
            Slot::Resulted { .. } => WorkflowState::Resulted,
        }
    }

    /// The file currently selected, being analyzed, or whose results are shown.
    pub fn current_file(&self) -> Option<FileDescriptor> {
        match &self.lock().slot {
            Slot::Idle => None,
            Slot::Selected(f) | Slot::Analyzing(f) => Some(f.descriptor.clone()),
            Slot::Resulted { file, .. } => Some(file.clone()),
        }
    }

    /// The QA list on display, available only in `Resulted`.
    pub fn results(&self) -> Option<Vec<QaPair>> {
        match &self.lock().slot {
            Slot::Resulted { results, .. } => Some(results.clone()),
            _ => None,
        }
    }

    pub fn vault_documents(&self) -> Vec<VaultDocument> {
        self.lock().vault.clone()
    }

    /// History, most recent first, optionally filtered by a
    /// case-insensitive substring of the file name.
    pub fn recent_activity(&self, filter: Option<&str>) -> Vec<ActivityRecord> {
        let inner = self.lock();
        match filter.map(str::to_lowercase) {
            Some(needle) if !needle.is_empty() => inner
                .activity
                .iter()
                .filter(|r| r.name.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
            _ => inner.activity.clone(),
        }
    }

    pub fn stats(&self) -> DashboardStats {
        let inner = self.lock();
        DashboardStats::from_lists(&inner.vault, &inner.activity)
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Take the pending user notice, if any.
    pub fn take_notice(&self) -> Option<String> {
        self.lock().notice.take()
    }
}
