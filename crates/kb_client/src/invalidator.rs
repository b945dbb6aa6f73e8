use crate::error::StoreError;
use crate::session::SessionVault;

/// Purges every piece of persisted identity state. Idempotent.
#[derive(Debug, Clone)]
pub struct SessionInvalidator {
    vault: SessionVault,
}

impl SessionInvalidator {
    pub fn new(vault: SessionVault) -> Self {
        Self { vault }
    }

    pub fn purge(&self, reason: &str) -> Result<(), StoreError> {
        let had_session = self.vault.access_token().is_some();
        self.vault.clear(None)?;
        self.log_purge(had_session, reason);
        Ok(())
    }

    /// Purges only if no session was started or purged since `epoch`.
    pub(crate) fn purge_within(&self, epoch: u64, reason: &str) -> Result<(), StoreError> {
        let had_session = self.vault.access_token().is_some();
        if self.vault.clear(Some(epoch))? {
            self.log_purge(had_session, reason);
        } else {
            log::debug!("Skipping purge for a superseded session: {}", reason);
        }
        Ok(())
    }

    fn log_purge(&self, had_session: bool, reason: &str) {
        if had_session {
            log::info!("Session cleared: {}", reason);
        } else {
            log::debug!("Session purge requested with no active session: {}", reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CredentialPair;
    use crate::store::{CredentialStore, MemoryStore, SESSION_KEYS};
    use std::sync::Arc;

    #[test]
    fn purge_removes_pair_and_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let vault = SessionVault::new(store.clone());
        vault
            .save_session(&CredentialPair::new("T1", Some("R1".to_string())), None)
            .unwrap();
        vault.set_identity(&Default::default()).unwrap();

        SessionInvalidator::new(vault.clone()).purge("test").unwrap();

        for key in SESSION_KEYS {
            assert_eq!(store.get(key), None, "{key} should be gone");
        }
    }

    #[test]
    fn purge_without_session_is_a_no_op() {
        let vault = SessionVault::new(Arc::new(MemoryStore::new()));
        let invalidator = SessionInvalidator::new(vault);
        invalidator.purge("first").unwrap();
        invalidator.purge("second").unwrap();
    }
}
