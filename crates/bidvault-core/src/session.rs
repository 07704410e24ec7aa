//! Device-local session slot.
//!
//! Exactly one [`SessionSnapshot`] lives in the slot at a time. It mirrors
//! the analysis currently open in the workspace so it survives a restart,
//! and is never authoritative: the store is.

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::SessionSnapshot;

/// Storage for the single session slot.
pub trait SessionCache: Send + Sync {
    /// Read the slot. An empty slot is `Ok(None)`.
    fn load(&self) -> Result<Option<SessionSnapshot>>;

    /// Overwrite the slot.
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;

    /// Empty the slot.
    fn clear(&self) -> Result<()>;
}

/// Slot held in process memory, for tests.
#[derive(Default)]
pub struct MemorySessionCache {
    slot: Mutex<Option<SessionSnapshot>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::StoreUnavailable("session slot lock poisoned".to_string())
}

impl SessionCache for MemorySessionCache {
    fn load(&self) -> Result<Option<SessionSnapshot>> {
        Ok(self.slot.lock().map_err(poisoned)?.clone())
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        *self.slot.lock().map_err(poisoned)? = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().map_err(poisoned)? = None;
        Ok(())
    }
}
