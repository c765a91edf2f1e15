//! Storage tier abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for token values that prevents accidental logging
//! - [`KeyValueStore`] - Trait for a single storage tier
//! - [`MemoryStore`] - In-process tier (session lifetime, and tests)
//! - [`FileStore`] - JSON file tier surviving restarts
//! - [`KeyringStore`] - OS keyring tier (with `keyring-store` feature)
//! - [`create_persisted_store`] - Helper to select the durable backend
//!
//! The credential layer composes two of these tiers, see
//! [`CredentialStore`](crate::credentials::CredentialStore).
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_core::store::{KeyValueStore, MemoryStore, Secret};
//!
//! let store = MemoryStore::new();
//! store.set("access_token", &Secret::new("eyJ...")).await?;
//!
//! let retrieved = store.get("access_token").await?;
//! assert_eq!(retrieved.unwrap().expose(), "eyJ...");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod file;
mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// A stored value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for storage tier operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// A single storage tier: an async string-to-secret map.
///
/// Implementations include:
/// - [`MemoryStore`] - process lifetime
/// - [`FileStore`] - JSON file on disk
/// - [`KeyringStore`] (with `keyring-store` feature) - OS keyring
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a value at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, value: &Secret) -> Result<(), StoreError>;

    /// Delete a value by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without retrieving the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Create the durable storage tier with automatic backend selection.
///
/// # Backend Selection Logic
///
/// - If `prefer_keyring` is `true` and the `keyring-store` feature is enabled,
///   attempts a [`KeyringStore`] and falls back with a warning if the keyring
///   is unavailable.
/// - Otherwise returns a [`FileStore`] at `path`.
///
/// # Example
///
/// ```rust,ignore
/// use storefront_core::store::{create_persisted_store, FileStore};
///
/// let path = FileStore::default_path()?;
/// let persisted = create_persisted_store(false, path)?;
/// ```
pub fn create_persisted_store(
    prefer_keyring: bool,
    path: PathBuf,
) -> Result<Box<dyn KeyValueStore>, StoreError> {
    #[cfg(feature = "keyring-store")]
    if prefer_keyring {
        match KeyringStore::try_new("storefront") {
            Ok(store) => {
                tracing::info!("Using OS keyring for remembered credentials");
                return Ok(Box::new(store));
            }
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to file store at {:?}",
                    e,
                    path
                );
            }
        }
    }

    #[cfg(not(feature = "keyring-store"))]
    if prefer_keyring {
        tracing::warn!(
            "Keyring storage requested but keyring-store feature not enabled. \
             Using file store at {:?}",
            path
        );
    }

    tracing::debug!("Using file store at {:?} for remembered credentials", path);
    Ok(Box::new(FileStore::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_create_persisted_store_file_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = create_persisted_store(false, dir.path().join("credentials.json")).unwrap();

        store.set("refresh_token", &Secret::new("r1")).await.unwrap();
        let retrieved = store.get("refresh_token").await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), "r1");
    }
}
