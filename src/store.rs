//! Persistence over the browser-scoped key-value store.
//!
//! [`CredentialStore`] is the only component that touches the persistent
//! store, and every operation is total: a storage-layer failure (quota,
//! disabled storage) degrades to `None`/no-op with a log line and never
//! propagates as an error. Expiry policy lives in callers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Flat key for the cached/SSO access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Flat key for the SSO ID token.
pub const ID_TOKEN_KEY: &str = "idToken";
/// Flat key for the SSO refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Flat key for the classification flag's source.
pub const TOKEN_SOURCE_KEY: &str = "tokenSource";
/// Flat key for the classification flag's observation time (unix seconds).
pub const TOKEN_TIMESTAMP_KEY: &str = "tokenTimestamp";

/// Root of the provider-defined native-session key namespace. The full set
/// of keys under it is provider-defined, so logout sweeps by prefix rather
/// than enumerating by hand.
pub const PROVIDER_KEY_ROOT: &str = "IdentityProvider";

/// Failure at the storage layer. Confined to [`StorageBackend`]
/// implementations; [`CredentialStore`] swallows it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage quota exceeded")]
    QuotaExceeded,
}

/// Capability interface over the platform's persistent key-value store.
///
/// The browser store is synchronous; implementations must not block on I/O.
pub trait StorageBackend: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Every key currently present, for prefix sweeps.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Pure in-memory backend, used in tests and headless tooling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read().keys().cloned().collect())
    }
}

impl MemoryStore {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Typed, total persistence facade with provider-specific key namespacing.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
    native_prefix: String,
}

impl CredentialStore {
    /// `client_id` scopes the native-session key namespace to this
    /// provider app client.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, client_id: impl AsRef<str>) -> Self {
        Self {
            backend,
            native_prefix: format!("{PROVIDER_KEY_ROOT}.{}", client_id.as_ref()),
        }
    }

    /// Prefix under which the provider persists native-session keys.
    #[must_use]
    pub fn native_prefix(&self) -> &str {
        &self.native_prefix
    }

    /// Full key for one native-session token of one user.
    #[must_use]
    pub fn native_key(&self, username: &str, leaf: &str) -> String {
        format!("{}.{username}.{leaf}", self.native_prefix)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            tracing::warn!(key, error = %e, "storage write failed");
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            tracing::warn!(key, error = %e, "storage remove failed");
        }
    }

    /// Remove every key sharing `prefix`. Enumeration failures degrade to
    /// a no-op sweep.
    pub fn remove_by_prefix(&self, prefix: &str) {
        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(prefix, error = %e, "storage enumeration failed");
                return;
            }
        };
        for key in keys.iter().filter(|k| k.starts_with(prefix)) {
            self.remove(key);
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("native_prefix", &self.native_prefix)
            .finish_non_exhaustive()
    }
}
