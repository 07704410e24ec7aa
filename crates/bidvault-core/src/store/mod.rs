//! Storage abstraction for Bidvault.
//!
//! The [`Store`] trait defines the two independently keyed collections the
//! pipeline persists: **vault** documents (secondary index on category) and
//! **activity** records (secondary index on creation date). Backends are
//! pluggable: SQLite in the main crate, [`memory::InMemoryStore`] for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ActivityRecord, VaultDocument};

/// Abstract storage backend.
///
/// Every mutating call is one self-contained transaction scoped to a single
/// collection. There is no cross-collection atomicity: clearing the vault and
/// then the activity log commits twice.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_vault`](Store::put_vault) | Insert or replace a vault document by id |
/// | [`all_vault`](Store::all_vault) | All vault documents, insertion order |
/// | [`delete_vault`](Store::delete_vault) | Remove one vault document |
/// | [`clear_vault`](Store::clear_vault) | Remove every vault document |
/// | [`put_activity`](Store::put_activity) | Insert or replace an activity record by id |
/// | [`all_activity`](Store::all_activity) | All activity records, most recent first |
/// | [`delete_activity`](Store::delete_activity) | Remove one activity record |
/// | [`clear_activity`](Store::clear_activity) | Remove every activity record |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace a vault document. Idempotent.
    async fn put_vault(&self, doc: &VaultDocument) -> Result<()>;

    async fn all_vault(&self) -> Result<Vec<VaultDocument>>;

    /// Deleting a missing id is not an error.
    async fn delete_vault(&self, id: &str) -> Result<()>;

    async fn clear_vault(&self) -> Result<()>;

    /// Insert or replace an activity record. Replacing keeps the record's
    /// original position in the insertion order.
    async fn put_activity(&self, record: &ActivityRecord) -> Result<()>;

    /// All activity records in reverse insertion order (most recent first).
    async fn all_activity(&self) -> Result<Vec<ActivityRecord>>;

    async fn delete_activity(&self, id: &str) -> Result<()>;

    async fn clear_activity(&self) -> Result<()>;
}
