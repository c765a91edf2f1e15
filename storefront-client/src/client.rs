use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use storefront_core::{
    ApiEnvelope, ApiError, AuthMode, ClientConfig, ConfigError, CredentialStore, ErrorKind,
    StorefrontError, TokenClaims, expires_within,
};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, debug_span, info, warn};
use url::Url;
use uuid::Uuid;

use crate::executor::{HttpExecutor, HttpResponse, RetryPolicy};
use crate::request::ApiRequest;

/// Token refresh endpoint, relative to the API base.
pub const DEFAULT_REFRESH_PATH: &str = "auth/token/refresh/";

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: String,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

/// Outcome of the most recent refresh, guarded by the refresh gate.
#[derive(Debug)]
struct RefreshState {
    last: Result<(), ApiError>,
}

impl Default for RefreshState {
    fn default() -> Self {
        Self { last: Ok(()) }
    }
}

struct Inner {
    executor: HttpExecutor,
    credentials: CredentialStore,
    config: ClientConfig,
    base_url: Url,
    cookies: Arc<Jar>,
    csrf_header: HeaderName,
    refresh_path: String,
    refresh_gate: Mutex<RefreshState>,
    /// Bumped each time a refresh completes, successful or not.
    generation: AtomicU64,
}

/// Authenticated client shared by every service module.
///
/// Each call through [`send`](Self::send):
/// 1. attaches the bearer token (bearer mode, non-public requests) and the
///    anti-forgery header from the cookie jar,
/// 2. dispatches through the [`HttpExecutor`],
/// 3. on a 401 for a non-public request, refreshes the access token once
///    and replays the call once; if the refresh fails the credential store
///    is cleared and the original 401 is returned.
///
/// Refreshes are serialized per client: concurrent 401s wait for the one
/// in-flight refresh and reuse its outcome.
///
/// Cheap to clone; clones share the credential store, cookie jar and
/// refresh gate.
///
/// # Example
///
/// ```no_run
/// use storefront_client::{ApiClient, ApiRequest};
/// use storefront_core::{ClientConfig, CredentialStore};
///
/// # async fn run() -> Result<(), storefront_core::StorefrontError> {
/// let client = ApiClient::new(
///     ClientConfig::with_api_url("https://shop.example.com/api/"),
///     CredentialStore::in_memory(),
/// )?;
///
/// let cart = client.send::<serde_json::Value>(ApiRequest::get("cart/")).await;
/// if let Some(error) = cart.error() {
///     eprintln!("{}", error);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client from `config` over `credentials`.
    pub fn new(config: ClientConfig, credentials: CredentialStore) -> Result<Self, StorefrontError> {
        Self::builder(config).credentials(credentials).build()
    }

    /// Start building a client.
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// The credential store this client reads and refreshes.
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Effective configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Cookie jar shared by every request from this client.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.inner.cookies
    }

    /// Perform `request` and shape the result into an envelope.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiEnvelope<T> {
        match self.send_raw(request).await {
            Ok(response) => response.into_envelope(),
            Err(error) => ApiEnvelope::Failure(error),
        }
    }

    /// Perform `request` with authentication and refresh handling.
    ///
    /// `Err` is only returned when no HTTP response was obtained.
    pub async fn send_raw(&self, request: ApiRequest) -> Result<HttpResponse, ApiError> {
        let call_id = Uuid::new_v4();
        let span = debug_span!(
            "api_call",
            %call_id,
            method = %request.method,
            path = %request.path,
        );
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<HttpResponse, ApiError> {
        if request.public {
            let headers = self.csrf_headers();
            return self.inner.executor.execute(&request, headers).await;
        }

        let refreshed_ahead = self.refresh_if_expiring().await;

        // Read before the token so a refresh that lands in between is seen
        // as a newer generation.
        let generation = self.inner.generation.load(Ordering::Acquire);
        let headers = self.auth_headers().await?;
        let response = self.inner.executor.execute(&request, headers).await?;

        if !response.is_unauthorized() || refreshed_ahead {
            return Ok(response);
        }

        debug!("Received 401, attempting token refresh");
        if self.refresh_serialized(generation).await.is_err() {
            return Ok(response);
        }

        debug!("Replaying request with refreshed credentials");
        let headers = self.auth_headers().await?;
        self.inner.executor.execute(&request, headers).await
    }

    /// Refresh the access token now.
    ///
    /// Goes through the same gate as 401-triggered refreshes. On failure the
    /// credential store has been cleared and the error describes why: the
    /// backend's rejection, or the executor's timeout or network failure.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let generation = self.inner.generation.load(Ordering::Acquire);
        self.refresh_serialized(generation).await
    }

    /// Proactive refresh for a bearer token inside the configured leeway.
    ///
    /// Returns true when a refresh was attempted for this call.
    async fn refresh_if_expiring(&self) -> bool {
        let Some(leeway) = self.inner.config.refresh_leeway() else {
            return false;
        };
        if self.inner.config.auth_mode != AuthMode::Bearer {
            return false;
        }
        let Some(token) = self.inner.credentials.access_token().await else {
            return false;
        };
        // Opaque tokens carry no expiry; leave them to the 401 path.
        let Some(expires_at) = TokenClaims::decode(token.expose()).and_then(|c| c.expires_at())
        else {
            return false;
        };
        if !expires_within(token.expose(), leeway) {
            return false;
        }
        if self.inner.credentials.refresh_token().await.is_none() {
            return false;
        }

        debug!("Access token expires at {}, refreshing ahead of dispatch", expires_at);
        let generation = self.inner.generation.load(Ordering::Acquire);
        let _ = self.refresh_serialized(generation).await;
        true
    }

    /// Run at most one refresh for callers that observed `seen`.
    ///
    /// A caller arriving after a refresh completed reuses that outcome
    /// instead of issuing its own.
    async fn refresh_serialized(&self, seen: u64) -> Result<(), ApiError> {
        let mut state = self.inner.refresh_gate.lock().await;
        if self.inner.generation.load(Ordering::Acquire) != seen {
            debug!("Token refresh already completed by a concurrent call");
            return state.last.clone();
        }

        let outcome = self.perform_refresh().await;
        state.last = outcome.clone();
        self.inner.generation.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn perform_refresh(&self) -> Result<(), ApiError> {
        let credentials = &self.inner.credentials;

        let body = match self.inner.config.auth_mode {
            AuthMode::Bearer => match credentials.refresh_token().await {
                Some(refresh) => json!({ "refresh": refresh.expose() }),
                None => {
                    warn!("No refresh token stored, clearing credentials");
                    credentials.clear_all().await;
                    return Err(ApiError::new(
                        ErrorKind::Unauthorized,
                        "No refresh token is available. Please sign in again.",
                    ));
                }
            },
            AuthMode::Cookie => json!({}),
        };

        let request = ApiRequest::post(self.inner.refresh_path.as_str())
            .json(&body)
            .public();
        let result = self
            .inner
            .executor
            .execute(&request, self.csrf_headers())
            .await;

        let outcome = match result {
            Ok(response) if response.status.is_success() => {
                match serde_json::from_value::<RefreshResponse>(response.body) {
                    Ok(tokens) => {
                        let remember = credentials.remember_me().await;
                        credentials
                            .store_tokens(&tokens.access, tokens.refresh.as_deref(), remember)
                            .await;
                        Ok(())
                    }
                    // The session cookie was renewed; there is no token to store.
                    Err(_) if self.inner.config.auth_mode == AuthMode::Cookie => Ok(()),
                    Err(e) => Err(ApiError::new(
                        ErrorKind::Decode,
                        format!("The server returned an unexpected refresh response: {}", e),
                    )
                    .with_status(response.status.as_u16())),
                }
            }
            Ok(response) => Err(ApiError::from_response(
                response.status.as_u16(),
                &response.body,
            )),
            Err(error) => Err(error),
        };

        match &outcome {
            Ok(()) => info!("Access token refreshed"),
            Err(error) => {
                warn!("Token refresh failed: {}; clearing credentials", error);
                credentials.clear_all().await;
            }
        }
        outcome
    }

    async fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = self.csrf_headers();
        if self.inner.config.auth_mode != AuthMode::Bearer {
            return Ok(headers);
        }
        if let Some(token) = self.inner.credentials.access_token().await {
            let raw = format!("{} {}", self.inner.config.auth_scheme, token.expose());
            let mut value = HeaderValue::from_str(&raw).map_err(|_| {
                ApiError::new(
                    ErrorKind::Config,
                    "stored access token is not a valid header value",
                )
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn csrf_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .csrf_token()
            .and_then(|token| HeaderValue::from_str(&token).ok())
        {
            headers.insert(self.inner.csrf_header.clone(), value);
        }
        headers
    }

    /// Anti-forgery token from the cookie jar, if the backend has set one.
    pub fn csrf_token(&self) -> Option<String> {
        let cookies = self.inner.cookies.cookies(&self.inner.base_url)?;
        let cookies = cookies.to_str().ok()?;
        let name = self.inner.config.csrf_cookie.as_str();
        cookies.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_url", &self.inner.config.api_url)
            .field("auth_mode", &self.inner.config.auth_mode)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: ClientConfig,
    credentials: Option<CredentialStore>,
    cookies: Option<Arc<Jar>>,
    refresh_path: String,
}

impl ApiClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            credentials: None,
            cookies: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }

    /// Credential store to use. Defaults to an in-memory store.
    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Share an existing cookie jar.
    pub fn cookie_jar(mut self, cookies: Arc<Jar>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Override the refresh endpoint path.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<ApiClient, StorefrontError> {
        self.config.validate()?;
        let base_url = self.config.base_url()?;

        let csrf_header = HeaderName::from_bytes(self.config.csrf_header.as_bytes()).map_err(|e| {
            ConfigError::Invalid {
                field: "csrf_header",
                message: e.to_string(),
            }
        })?;

        let cookies = self.cookies.unwrap_or_default();
        let http = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .user_agent(self.config.user_agent.as_str())
            .build()
            .map_err(|e| StorefrontError::Http {
                message: e.to_string(),
            })?;

        let executor = HttpExecutor::new(http, base_url.clone(), RetryPolicy::from_config(&self.config));

        debug!(
            "Created API client for {} ({:?} auth)",
            base_url, self.config.auth_mode
        );

        Ok(ApiClient {
            inner: Arc::new(Inner {
                executor,
                credentials: self.credentials.unwrap_or_else(CredentialStore::in_memory),
                config: self.config,
                base_url,
                cookies,
                csrf_header,
                refresh_path: self.refresh_path,
                refresh_gate: Mutex::new(RefreshState::default()),
                generation: AtomicU64::new(0),
            }),
        })
    }
}
