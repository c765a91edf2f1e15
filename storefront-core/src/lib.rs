//! # Storefront Core
//!
//! Building blocks shared by the storefront API client.
//!
//! This crate provides:
//! - Storage tiers behind the [`KeyValueStore`] trait (memory, file, keyring)
//! - [`CredentialStore`], the session/persisted credential store
//! - JWT claim inspection for token liveness checks
//! - [`ApiEnvelope`], the uniform result of every service call
//! - [`ClientConfig`], loaded from TOML and the environment
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storefront_core::{CredentialStore, is_token_expired};
//!
//! async fn current_token(store: &CredentialStore) -> Option<String> {
//!     let token = store.access_token().await?;
//!     (!is_token_expired(token.expose())).then(|| token.expose().to_string())
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod store;
pub mod token;

// Re-export commonly used types at crate root
pub use config::{AuthMode, ClientConfig, ConfigError};

pub use credentials::{CredentialStore, Credentials, Tier};

pub use envelope::{ApiEnvelope, ApiError, ErrorKind, PageQuery, Paginated};

pub use error::StorefrontError;

pub use store::{FileStore, KeyValueStore, MemoryStore, Secret, StoreError, create_persisted_store};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use token::{TokenClaims, expires_within, is_token_expired};
