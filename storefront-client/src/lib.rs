//! Storefront Client Library
//!
//! An async Rust client for the storefront REST backend. Every call goes
//! through one resilient, authenticated request layer and resolves to an
//! [`ApiEnvelope`](storefront_core::ApiEnvelope) instead of an error.
//!
//! # Overview
//!
//! The request layer has two halves:
//!
//! - [`HttpExecutor`] runs each attempt under a deadline and retries
//!   transient network failures (timeouts, connect failures, resets) with
//!   exponential backoff. A received HTTP response is never retried.
//! - [`ApiClient`] attaches the bearer token and anti-forgery header, and
//!   on a 401 refreshes the access token once and replays the call once.
//!   Refreshes are serialized so concurrent 401s cause a single refresh
//!   request. A failed refresh clears the credential store.
//!
//! The [`services`] modules wrap the backend's endpoints in typed methods.
//!
//! # Quick Start
//!
//! ```no_run
//! use storefront_client::{ProductFilter, Storefront};
//! use storefront_core::{ClientConfig, CredentialStore, PageQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), storefront_core::StorefrontError> {
//!     let config = ClientConfig::load(ClientConfig::default_path().as_deref())?;
//!     let shop = Storefront::new(config, CredentialStore::in_memory())?;
//!
//!     let page = shop
//!         .products
//!         .list(&ProductFilter::search("teapot"), PageQuery::default())
//!         .await;
//!     match page.into_result() {
//!         Ok(page) => println!("{} products", page.count),
//!         Err(error) => eprintln!("{}", error),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! See [`ClientConfig`](storefront_core::ClientConfig). The API base URL,
//! bearer scheme and auth mode can be overridden with `STOREFRONT_API_URL`,
//! `STOREFRONT_AUTH_SCHEME` and `STOREFRONT_AUTH_MODE`.

mod client;
pub mod executor;
pub mod request;
pub mod services;

pub use client::{ApiClient, ApiClientBuilder, DEFAULT_REFRESH_PATH};

pub use executor::{FailureClass, HttpExecutor, HttpResponse, RetryPolicy};
pub use request::{ApiRequest, RequestOptions};

pub use services::Storefront;
pub use services::auth::{AuthResponse, ProfileUpdate, RegisterRequest, ResetPasswordRequest, UserProfile};
pub use services::products::{Product, ProductFilter};
