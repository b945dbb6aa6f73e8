//! Typed view over the durable store: the credential pair and the cached
//! identity snapshot.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::models::UserProfile;
use crate::store::{
    CredentialStore, StoreWrite, ACCESS_TOKEN_KEY, IDENTITY_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    fn writes(&self) -> [StoreWrite; 2] {
        [
            StoreWrite::Set(ACCESS_TOKEN_KEY, self.access_token.clone()),
            match &self.refresh_token {
                Some(refresh) => StoreWrite::Set(REFRESH_TOKEN_KEY, refresh.clone()),
                None => StoreWrite::Remove(REFRESH_TOKEN_KEY),
            },
        ]
    }
}

/// Clones share the store and the session epoch. The epoch advances whenever
/// a session is started or purged; writes that belong to an older epoch are
/// dropped.
#[derive(Clone)]
pub struct SessionVault {
    store: Arc<dyn CredentialStore>,
    epoch: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for SessionVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVault")
            .field("authenticated", &self.access_token().is_some())
            .finish()
    }
}

impl SessionVault {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            epoch: Arc::new(Mutex::new(0)),
        }
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn epoch(&self) -> u64 {
        *self.lock_epoch()
    }

    pub fn access_token(&self) -> Option<String> {
        non_empty(self.store.get(ACCESS_TOKEN_KEY))
    }

    pub fn refresh_token(&self) -> Option<String> {
        non_empty(self.store.get(REFRESH_TOKEN_KEY))
    }

    pub fn credentials(&self) -> Option<CredentialPair> {
        let access_token = self.access_token()?;
        Some(CredentialPair {
            access_token,
            refresh_token: self.refresh_token(),
        })
    }

    /// Last-known profile, for display only. An unparsable snapshot reads as
    /// absent.
    pub fn identity(&self) -> Option<UserProfile> {
        let raw = self.store.get(IDENTITY_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(err) => {
                log::debug!("Ignoring unparsable identity snapshot: {}", err);
                None
            }
        }
    }

    /// Stores a fresh login: pair and snapshot land in one batch.
    pub fn save_session(
        &self,
        pair: &CredentialPair,
        identity: Option<&UserProfile>,
    ) -> Result<(), StoreError> {
        let mut batch: Vec<StoreWrite> = pair.writes().into();
        batch.push(match identity {
            Some(profile) => StoreWrite::Set(IDENTITY_KEY, serde_json::to_string(profile)?),
            None => StoreWrite::Remove(IDENTITY_KEY),
        });
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.store.apply(&batch)
    }

    pub fn replace_pair(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let _epoch = self.lock_epoch();
        self.store.apply(&pair.writes())
    }

    /// Stores `pair` only while the session is still the one that was current
    /// at `expected`. Returns whether the write happened.
    pub(crate) fn replace_pair_within(
        &self,
        expected: u64,
        pair: &CredentialPair,
    ) -> Result<bool, StoreError> {
        let epoch = self.lock_epoch();
        if *epoch != expected {
            return Ok(false);
        }
        self.store.apply(&pair.writes())?;
        Ok(true)
    }

    /// Removes the pair and snapshot and ends the current epoch. With
    /// `expected` set, does nothing once a newer session has started.
    pub(crate) fn clear(&self, expected: Option<u64>) -> Result<bool, StoreError> {
        let mut epoch = self.lock_epoch();
        if expected.is_some_and(|e| e != *epoch) {
            return Ok(false);
        }
        *epoch += 1;
        self.store.apply(&SESSION_KEYS.map(StoreWrite::Remove))?;
        Ok(true)
    }

    /// Swaps only the access token, keeping the stored refresh token. Without
    /// a current session there is nothing to swap and the call is a no-op.
    pub fn replace_access_token(&self, access_token: &str) -> Result<bool, StoreError> {
        let _epoch = self.lock_epoch();
        if self.access_token().is_none() {
            return Ok(false);
        }
        self.store
            .apply(&[StoreWrite::Set(ACCESS_TOKEN_KEY, access_token.to_string())])?;
        Ok(true)
    }

    pub fn set_identity(&self, identity: &UserProfile) -> Result<(), StoreError> {
        self.store
            .apply(&[StoreWrite::Set(IDENTITY_KEY, serde_json::to_string(identity)?)])
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn vault() -> SessionVault {
        SessionVault::new(Arc::new(MemoryStore::new()))
    }

    fn alice() -> UserProfile {
        UserProfile {
            id: Some(7),
            username: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn save_session_writes_all_three_keys() {
        let vault = vault();
        vault
            .save_session(&CredentialPair::new("T1", Some("R1".to_string())), Some(&alice()))
            .unwrap();

        assert_eq!(vault.access_token().as_deref(), Some("T1"));
        assert_eq!(vault.refresh_token().as_deref(), Some("R1"));
        assert_eq!(vault.identity().map(|u| u.username), Some("alice".to_string()));
    }

    #[test]
    fn login_without_profile_drops_previous_snapshot() {
        let vault = vault();
        vault
            .save_session(&CredentialPair::new("T1", Some("R1".to_string())), Some(&alice()))
            .unwrap();
        vault
            .save_session(&CredentialPair::new("T2", Some("R2".to_string())), None)
            .unwrap();
        assert!(vault.identity().is_none());
    }

    #[test]
    fn replace_access_token_keeps_refresh_token() {
        let vault = vault();
        vault
            .replace_pair(&CredentialPair::new("T1", Some("R1".to_string())))
            .unwrap();
        vault.replace_access_token("T1b").unwrap();
        assert_eq!(
            vault.credentials(),
            Some(CredentialPair::new("T1b", Some("R1".to_string())))
        );
    }

    #[test]
    fn access_token_swap_needs_a_session() {
        let vault = vault();
        assert!(!vault.replace_access_token("T9").unwrap());
        assert!(vault.access_token().is_none());
    }

    #[test]
    fn blank_tokens_read_as_absent() {
        let vault = vault();
        vault.replace_pair(&CredentialPair::new("  ", None)).unwrap();
        assert!(vault.access_token().is_none());
        assert!(vault.credentials().is_none());
    }

    #[test]
    fn stale_epoch_writes_are_dropped() {
        let vault = vault();
        vault
            .save_session(&CredentialPair::new("T1", Some("R1".to_string())), Some(&alice()))
            .unwrap();
        let started = vault.epoch();

        assert!(vault.clear(None).unwrap());
        let written = vault
            .replace_pair_within(started, &CredentialPair::new("T2", Some("R2".to_string())))
            .unwrap();

        assert!(!written);
        assert!(vault.credentials().is_none());
    }

    #[test]
    fn stale_clear_keeps_a_newer_session() {
        let vault = vault();
        let before_login = vault.epoch();
        vault
            .save_session(&CredentialPair::new("T1", Some("R1".to_string())), Some(&alice()))
            .unwrap();

        assert!(!vault.clear(Some(before_login)).unwrap());
        assert_eq!(vault.access_token().as_deref(), Some("T1"));
    }

    #[test]
    fn garbage_identity_reads_as_absent() {
        let store = Arc::new(MemoryStore::new());
        store
            .apply(&[StoreWrite::Set(IDENTITY_KEY, "[1,2".to_string())])
            .unwrap();
        assert!(SessionVault::new(store).identity().is_none());
    }
}
