//! Key-value persistence for the cart blob.
//!
//! The cart is stored as a single JSON string under one well-known key.
//! [`SessionStorage`] keeps it in the visitor's server-side session;
//! [`MemoryStorage`] keeps it in process memory for tests and tooling.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tower_sessions::Session;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The session store failed to read or write.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The backend is unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key-value store addressed by a single cart key.
pub trait CartStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String)
    -> impl Future<Output = Result<(), StorageError>> + Send;
}

// =============================================================================
// Session-backed storage
// =============================================================================

/// Cart storage inside a `tower-sessions` session.
#[derive(Clone, Debug)]
pub struct SessionStorage {
    session: Session,
}

impl SessionStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStorage for SessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.session.get::<String>(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.session.insert(key, value).await?;
        Ok(())
    }
}

// =============================================================================
// In-memory storage
// =============================================================================

/// Process-local cart storage. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a raw value, e.g. a blob read from disk.
    #[must_use]
    pub fn with_value(key: &str, value: impl Into<String>) -> Self {
        let storage = Self::default();
        storage
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
        storage
    }

    /// Read a value without going through the async interface.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl CartStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}
