//! Dual-tier credential storage.
//!
//! [`CredentialStore`] is the single source of truth for the access token,
//! refresh token and cached user profile. It composes two
//! [`KeyValueStore`] tiers:
//!
//! - the **session** tier, always written, gone when the process ends;
//! - the **persisted** tier, written only when the caller opts in to
//!   "remember me".
//!
//! Reads prefer the session tier and fall back to the persisted tier.
//! Read paths never fail: a backend error is logged and treated as absent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::store::{KeyValueStore, MemoryStore, Secret};
use crate::token;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the cached user profile.
pub const USER_DATA_KEY: &str = "user_data";
/// Profile key written by older releases; only ever deleted.
pub const LEGACY_USER_KEY: &str = "user";

const ALL_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_DATA_KEY,
    LEGACY_USER_KEY,
];

/// Which tier a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Process-lifetime storage.
    Session,
    /// Storage that survives restarts.
    Persisted,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::Persisted => write!(f, "persisted"),
        }
    }
}

/// Access and refresh tokens read together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Current access token, if any.
    pub access_token: Option<Secret>,
    /// Current refresh token, if any.
    pub refresh_token: Option<Secret>,
}

/// Credential store over a session tier and a persisted tier.
///
/// Cheap to clone; clones share the same tiers.
///
/// # Example
///
/// ```rust,ignore
/// use storefront_core::CredentialStore;
///
/// let store = CredentialStore::in_memory();
/// store.set_access_token("eyJ...", false).await;
/// assert!(store.access_token().await.is_some());
/// ```
#[derive(Clone)]
pub struct CredentialStore {
    session: Arc<dyn KeyValueStore>,
    persisted: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Create a store over the given tiers.
    pub fn new(session: Arc<dyn KeyValueStore>, persisted: Arc<dyn KeyValueStore>) -> Self {
        Self { session, persisted }
    }

    /// Create a store whose tiers are both in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    fn tier(&self, tier: Tier) -> &dyn KeyValueStore {
        match tier {
            Tier::Session => self.session.as_ref(),
            Tier::Persisted => self.persisted.as_ref(),
        }
    }

    /// Read `key` from one tier, swallowing backend errors.
    pub async fn read_tier(&self, tier: Tier, key: &str) -> Option<Secret> {
        match self.tier(tier).get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read {} from {} storage: {}", key, tier, e);
                None
            }
        }
    }

    async fn write_tier(&self, tier: Tier, key: &str, value: &Secret) {
        if let Err(e) = self.tier(tier).set(key, value).await {
            tracing::warn!("Failed to write {} to {} storage: {}", key, tier, e);
        }
    }

    async fn write(&self, key: &str, value: &Secret, remember: bool) {
        self.write_tier(Tier::Session, key, value).await;
        if remember {
            self.write_tier(Tier::Persisted, key, value).await;
        }
    }

    async fn read(&self, key: &str) -> Option<Secret> {
        match self.read_tier(Tier::Session, key).await {
            Some(value) => Some(value),
            None => self.read_tier(Tier::Persisted, key).await,
        }
    }

    /// Store the access token in the session tier, and in the persisted tier
    /// iff `remember`.
    pub async fn set_access_token(&self, token: &str, remember: bool) {
        self.write(ACCESS_TOKEN_KEY, &Secret::new(token), remember)
            .await;
    }

    /// Store the refresh token with the same tier rules as
    /// [`set_access_token`](Self::set_access_token).
    pub async fn set_refresh_token(&self, token: &str, remember: bool) {
        self.write(REFRESH_TOKEN_KEY, &Secret::new(token), remember)
            .await;
    }

    /// Store both tokens after a login, registration or refresh.
    pub async fn store_tokens(&self, access: &str, refresh: Option<&str>, remember: bool) {
        self.set_access_token(access, remember).await;
        if let Some(refresh) = refresh {
            self.set_refresh_token(refresh, remember).await;
        }
    }

    /// Current access token: session tier, else persisted tier.
    pub async fn access_token(&self) -> Option<Secret> {
        self.read(ACCESS_TOKEN_KEY).await
    }

    /// Current refresh token: session tier, else persisted tier.
    pub async fn refresh_token(&self) -> Option<Secret> {
        self.read(REFRESH_TOKEN_KEY).await
    }

    /// Both tokens.
    pub async fn credentials(&self) -> Credentials {
        Credentials {
            access_token: self.access_token().await,
            refresh_token: self.refresh_token().await,
        }
    }

    /// Whether the current session was created with "remember me".
    ///
    /// Decided by the persisted tier holding a refresh token. Refreshed
    /// tokens are written back with this flag so a remembered session stays
    /// remembered.
    pub async fn remember_me(&self) -> bool {
        self.read_tier(Tier::Persisted, REFRESH_TOKEN_KEY)
            .await
            .is_some()
    }

    /// Cache the user profile as JSON.
    pub async fn set_user_data<T: Serialize>(&self, profile: &T, remember: bool) {
        match serde_json::to_string(profile) {
            Ok(json) => self.write(USER_DATA_KEY, &Secret::new(json), remember).await,
            Err(e) => tracing::warn!("Failed to serialize user profile: {}", e),
        }
    }

    /// Cached user profile.
    ///
    /// A value that no longer parses as `T` is treated as absent. The
    /// persisted tier is consulted when the session copy is missing or
    /// corrupt.
    pub async fn user_data<T: DeserializeOwned>(&self) -> Option<T> {
        for tier in [Tier::Session, Tier::Persisted] {
            let Some(raw) = self.read_tier(tier, USER_DATA_KEY).await else {
                continue;
            };
            match serde_json::from_str(raw.expose()) {
                Ok(profile) => return Some(profile),
                Err(e) => {
                    tracing::warn!("Ignoring unparseable cached profile in {} storage: {}", tier, e);
                }
            }
        }
        None
    }

    /// Remove every credential and profile key, plus the legacy key, from
    /// both tiers.
    ///
    /// Idempotent and safe on an empty store; failures are logged.
    pub async fn clear_all(&self) {
        for tier in [Tier::Session, Tier::Persisted] {
            for key in ALL_KEYS {
                if let Err(e) = self.tier(tier).delete(key).await {
                    tracing::warn!("Failed to delete {} from {} storage: {}", key, tier, e);
                }
            }
        }
        tracing::debug!("Cleared stored credentials");
    }

    /// Whether `token` should be considered expired.
    ///
    /// See [`token::is_token_expired`].
    pub fn is_token_expired(&self, token: &str) -> bool {
        token::is_token_expired(token)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
