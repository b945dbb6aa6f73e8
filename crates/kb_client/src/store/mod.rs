//! Durable key-value storage for the session.
//!
//! Writes are batched: [`CredentialStore::apply`] either lands every entry of
//! the batch or none of them, which is what keeps the access/refresh pair from
//! ever being observed half-updated.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;

pub const ACCESS_TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const IDENTITY_KEY: &str = "userInfo";

/// Every key the session layer owns, in purge order.
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, IDENTITY_KEY];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Set(&'static str, String),
    Remove(&'static str),
}

pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Applies the whole batch atomically.
    fn apply(&self, batch: &[StoreWrite]) -> Result<(), StoreError>;
}
