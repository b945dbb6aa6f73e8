use std::collections::HashMap;
use std::sync::RwLock;

use super::{CredentialStore, StoreWrite};
use crate::error::StoreError;

/// In-process store; the session ends with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().ok()?;
        entries.get(key).cloned()
    }

    fn apply(&self, batch: &[StoreWrite]) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Io("memory store lock poisoned".to_string()))?;
        for write in batch {
            match write {
                StoreWrite::Set(key, value) => {
                    entries.insert((*key).to_string(), value.clone());
                }
                StoreWrite::Remove(key) => {
                    entries.remove(*key);
                }
            }
        }
        Ok(())
    }
}
