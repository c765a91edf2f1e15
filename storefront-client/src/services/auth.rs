//! Authentication and profile endpoints.
//!
//! Login, registration and profile reads write through to the
//! [`CredentialStore`](storefront_core::CredentialStore) on success, logout
//! always clears it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use storefront_core::{ApiEnvelope, ApiError, AuthMode, ErrorKind, is_token_expired};
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::request::ApiRequest;

/// The signed-in user's profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: u64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Fields this client does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// "First Last", or the email when no name is set.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Tokens (and usually the profile) returned by login and registration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthResponse {
    #[serde(alias = "access_token")]
    pub access: Option<String>,
    #[serde(alias = "refresh_token")]
    pub refresh: Option<String>,
    pub user: Option<UserProfile>,
    pub message: Option<String>,
}

impl AuthResponse {
    /// Some backends nest the pair under `tokens`.
    fn normalize(mut self, raw: &Value) -> Self {
        if let Some(tokens) = raw.get("tokens") {
            if self.access.is_none() {
                self.access = tokens
                    .get("access")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            if self.refresh.is_none() {
                self.refresh = tokens
                    .get("refresh")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }
        self
    }
}

impl Serialize for AuthResponse {
    // Tokens are never echoed back out, only whether they were issued.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("AuthResponse", 3)?;
        state.serialize_field("authenticated", &self.access.is_some())?;
        state.serialize_field("user", &self.user)?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

/// Account registration payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_confirm: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Password reset with a one-time code.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

/// Partial profile update; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// `auth/` endpoints.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Sign in. On success the tokens are stored, durably iff `remember`.
    pub async fn login(&self, email: &str, password: &str, remember: bool) -> ApiEnvelope<AuthResponse> {
        let request = ApiRequest::post("auth/login/")
            .json(&json!({ "email": email, "password": password }))
            .public();
        let envelope = self.authenticate(request, remember).await;
        if envelope.is_success() {
            info!("Logged in (remember: {})", remember);
        }
        envelope
    }

    /// Create an account. Tokens returned by the backend are stored like a
    /// login.
    pub async fn register(
        &self,
        registration: &RegisterRequest,
        remember: bool,
    ) -> ApiEnvelope<AuthResponse> {
        let request = ApiRequest::post("auth/register/")
            .json(registration)
            .public();
        let envelope = self.authenticate(request, remember).await;
        if envelope.is_success() {
            info!("Registered new account");
        }
        envelope
    }

    async fn authenticate(&self, request: ApiRequest, remember: bool) -> ApiEnvelope<AuthResponse> {
        let raw: ApiEnvelope<Value> = self.client.send(request).await;
        let raw = match raw.into_result() {
            Ok(raw) => raw,
            Err(error) => return ApiEnvelope::Failure(error),
        };
        let response = match serde_json::from_value::<AuthResponse>(raw.clone()) {
            Ok(response) => response.normalize(&raw),
            Err(e) => {
                return ApiEnvelope::Failure(ApiError::new(
                    ErrorKind::Decode,
                    format!("The server returned an unexpected response: {}", e),
                ));
            }
        };

        // A new login replaces whatever an earlier session left in either tier.
        let credentials = self.client.credentials();
        credentials.clear_all().await;
        match response.access.as_deref() {
            Some(access) => {
                credentials
                    .store_tokens(access, response.refresh.as_deref(), remember)
                    .await;
            }
            None if self.client.config().auth_mode == AuthMode::Cookie => {}
            None => warn!("Authentication succeeded without an access token"),
        }
        if let Some(user) = &response.user {
            credentials.set_user_data(user, remember).await;
        }

        ApiEnvelope::Success(response)
    }

    /// Email a one-time code.
    pub async fn send_otp(&self, email: &str) -> ApiEnvelope<Value> {
        let request = ApiRequest::post("auth/send-otp/")
            .json(&json!({ "email": email }))
            .public();
        self.client.send(request).await
    }

    /// Set a new password using a one-time code.
    pub async fn reset_password(&self, reset: &ResetPasswordRequest) -> ApiEnvelope<Value> {
        let request = ApiRequest::post("auth/reset-password/")
            .json(reset)
            .public();
        self.client.send(request).await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> ApiEnvelope<Value> {
        let request = ApiRequest::post("auth/change-password/").json(&json!({
            "old_password": old_password,
            "new_password": new_password,
        }));
        self.client.send(request).await
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Shares the client's refresh gate; a failed refresh clears the
    /// credential store.
    pub async fn refresh_token(&self) -> ApiEnvelope<()> {
        match self.client.refresh().await {
            Ok(()) => ApiEnvelope::Success(()),
            Err(error) => ApiEnvelope::Failure(error),
        }
    }

    /// Sign out. Local credentials are cleared whatever the server says.
    pub async fn logout(&self) -> ApiEnvelope<Value> {
        let credentials = self.client.credentials();
        let body = match credentials.refresh_token().await {
            Some(refresh) => json!({ "refresh": refresh.expose() }),
            None => json!({}),
        };
        let envelope = self
            .client
            .send(ApiRequest::post("auth/logout/").json(&body).retries(0))
            .await;
        if let Some(error) = envelope.error() {
            warn!("Logout request failed: {}", error);
        }
        credentials.clear_all().await;
        info!("Logged out");
        envelope
    }

    /// Fetch the profile and refresh the cached copy.
    pub async fn profile(&self) -> ApiEnvelope<UserProfile> {
        let envelope = self.client.send(ApiRequest::get("auth/profile/")).await;
        self.cache_profile(envelope).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiEnvelope<UserProfile> {
        let envelope = self
            .client
            .send(ApiRequest::patch("auth/profile/").json(update))
            .await;
        self.cache_profile(envelope).await
    }

    async fn cache_profile(&self, envelope: ApiEnvelope<UserProfile>) -> ApiEnvelope<UserProfile> {
        if let Some(profile) = envelope.data() {
            let credentials = self.client.credentials();
            let remember = credentials.remember_me().await;
            credentials.set_user_data(profile, remember).await;
        }
        envelope
    }

    /// Profile cached by the last login or profile fetch.
    pub async fn cached_profile(&self) -> Option<UserProfile> {
        self.client.credentials().user_data().await
    }

    /// Whether a live access token or any refresh token is stored.
    ///
    /// In cookie mode the session lives in the cookie jar; a cached profile
    /// stands in for it.
    pub async fn is_authenticated(&self) -> bool {
        let credentials = self.client.credentials();
        if self.client.config().auth_mode == AuthMode::Cookie {
            return credentials.user_data::<Value>().await.is_some();
        }
        if let Some(access) = credentials.access_token().await {
            if !is_token_expired(access.expose()) {
                return true;
            }
        }
        credentials.refresh_token().await.is_some()
    }
}
