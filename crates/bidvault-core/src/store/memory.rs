//! In-memory [`Store`] implementation for testing.
//!
//! Both collections are `Vec`s behind `std::sync::RwLock`, kept in
//! insertion order so the ordering contract matches the SQLite backend.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{ActivityRecord, VaultDocument};

use super::Store;

/// In-memory store for tests and embedding.
pub struct InMemoryStore {
    vault: RwLock<Vec<VaultDocument>>,
    activity: RwLock<Vec<ActivityRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            vault: RwLock::new(Vec::new()),
            activity: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::StoreUnavailable("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_vault(&self, doc: &VaultDocument) -> Result<()> {
        let mut vault = self.vault.write().map_err(poisoned)?;
        match vault.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc.clone(),
            None => vault.push(doc.clone()),
        }
        Ok(())
    }

    async fn all_vault(&self) -> Result<Vec<VaultDocument>> {
        Ok(self.vault.read().map_err(poisoned)?.clone())
    }

    async fn delete_vault(&self, id: &str) -> Result<()> {
        self.vault.write().map_err(poisoned)?.retain(|d| d.id != id);
        Ok(())
    }

    async fn clear_vault(&self) -> Result<()> {
        self.vault.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn put_activity(&self, record: &ActivityRecord) -> Result<()> {
        let mut activity = self.activity.write().map_err(poisoned)?;
        match activity.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => activity.push(record.clone()),
        }
        Ok(())
    }

    async fn all_activity(&self) -> Result<Vec<ActivityRecord>> {
        let activity = self.activity.read().map_err(poisoned)?;
        Ok(activity.iter().rev().cloned().collect())
    }

    async fn delete_activity(&self, id: &str) -> Result<()> {
        self.activity
            .write()
            .map_err(poisoned)?
            .retain(|r| r.id != id);
        Ok(())
    }

    async fn clear_activity(&self) -> Result<()> {
        self.activity.write().map_err(poisoned)?.clear();
        Ok(())
    }
}
