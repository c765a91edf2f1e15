//! Top-level error types for the storefront client.

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Top-level error type for fallible setup work.
///
/// Request-level failures never surface as this type; they are carried in
/// [`ApiEnvelope::Failure`](crate::envelope::ApiEnvelope).
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Error from a storage tier.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed.
    #[error("http client error: {message}")]
    Http { message: String },
}
