//! Request execution with per-attempt deadlines and bounded retries.
//!
//! [`HttpExecutor`] performs one logical call:
//! - every attempt runs under its own deadline,
//! - transient failures (deadline exceeded, connect failures, reset/EOF
//!   style faults) are retried after `backoff_base * 2^n`,
//! - any received HTTP response, whatever its status, is returned as data
//!   and never retried.
//!
//! Dropping the future returned by [`HttpExecutor::execute`] cancels the
//! in-flight attempt and any pending backoff sleep.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use storefront_core::{ApiEnvelope, ApiError, ClientConfig, ErrorKind};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::request::ApiRequest;

/// Error-chain fragments that identify a transient network fault.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "connection reset",
    "connection closed",
    "connection aborted",
    "broken pipe",
    "unexpected eof",
    "end of file",
    "incomplete message",
    "timed out",
];

/// Timeout, retry and backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Additional attempts after a transient failure.
    pub retries: u32,
    /// Delay before the first retry; doubles for each following one.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Policy taken from the client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retries: config.retries,
            backoff_base: config.backoff_base(),
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let multiplier = 1u32 << retry.min(16);
        self.backoff_base.saturating_mul(multiplier)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// How a failed attempt is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The attempt ran into its deadline. Retryable.
    Timeout,
    /// Connect failure or reset/EOF style fault. Retryable.
    Transient,
    /// Anything else. Not retried.
    Terminal,
}

impl FailureClass {
    /// Whether another attempt may be made.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Terminal)
    }
}

/// Classify a transport error from `reqwest`.
pub fn classify(err: &reqwest::Error) -> FailureClass {
    if err.is_timeout() {
        return FailureClass::Timeout;
    }
    if err.is_connect() || has_transient_signature(err) {
        return FailureClass::Transient;
    }
    FailureClass::Terminal
}

/// Walk an error chain looking for a transient I/O fault.
pub fn has_transient_signature(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            use std::io::ErrorKind::*;
            if matches!(
                io.kind(),
                ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof | TimedOut | NotConnected
            ) {
                return true;
            }
        }
        let text = e.to_string().to_lowercase();
        if TRANSIENT_SIGNATURES.iter().any(|sig| text.contains(sig)) {
            return true;
        }
        current = e.source();
    }
    false
}

/// A received HTTP response with its body parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Parsed body; `Null` when empty or not JSON.
    pub body: Value,
    /// Attempts it took to get this response.
    pub attempts: u32,
}

impl HttpResponse {
    /// Whether the status is 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Reshape into the uniform envelope.
    pub fn into_envelope<T: DeserializeOwned>(self) -> ApiEnvelope<T> {
        let status = self.status.as_u16();
        if !self.status.is_success() {
            return ApiEnvelope::Failure(ApiError::from_response(status, &self.body));
        }
        match serde_json::from_value(self.body) {
            Ok(data) => ApiEnvelope::Success(data),
            Err(e) => {
                warn!("Unexpected response shape (status {}): {}", status, e);
                ApiEnvelope::Failure(
                    ApiError::new(
                        ErrorKind::Decode,
                        format!("The server returned an unexpected response: {}", e),
                    )
                    .with_status(status),
                )
            }
        }
    }
}

/// Executes [`ApiRequest`]s against the API base.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: Url,
    policy: RetryPolicy,
}

impl HttpExecutor {
    /// Create an executor over an existing `reqwest` client.
    pub fn new(client: reqwest::Client, base_url: Url, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url,
            policy,
        }
    }

    /// The default policy applied to requests without overrides.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::new(ErrorKind::Config, format!("invalid path {}: {}", path, e)))
    }

    /// Perform `request` with `headers` added, retrying transient failures.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        headers: HeaderMap,
    ) -> Result<HttpResponse, ApiError> {
        if let Some(problem) = request.build_error() {
            return Err(ApiError::new(ErrorKind::Config, problem));
        }
        let url = self.url(&request.path)?;
        let timeout = request.options.timeout.unwrap_or(self.policy.timeout);
        let retries = request.options.retries.unwrap_or(self.policy.retries);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let deadline = Instant::now() + timeout;

            let mut builder = self
                .client
                .request(request.method.clone(), url.clone())
                .headers(request.headers.clone())
                .headers(headers.clone());
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            debug!(
                "{} {} (attempt {}/{})",
                request.method,
                url.path(),
                attempt,
                retries + 1
            );

            let class = match tokio::time::timeout_at(deadline, builder.send()).await {
                Ok(Ok(response)) => {
                    return Ok(read_response(response, deadline, attempt).await);
                }
                Ok(Err(err)) => {
                    let class = classify(&err);
                    debug!("{} {} failed ({:?}): {}", request.method, url.path(), class, err);
                    if class == FailureClass::Terminal {
                        return Err(ApiError::new(
                            ErrorKind::Network,
                            format!("Request failed: {}", err),
                        ));
                    }
                    class
                }
                Err(_) => {
                    debug!("{} {} timed out after {:?}", request.method, url.path(), timeout);
                    FailureClass::Timeout
                }
            };

            if attempt > retries {
                warn!(
                    "{} {} giving up after {} attempts",
                    request.method,
                    url.path(),
                    attempt
                );
                return Err(match class {
                    FailureClass::Timeout => ApiError::timeout(),
                    _ => ApiError::network(),
                });
            }

            let delay = self.policy.backoff_delay(attempt - 1);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn read_response(response: reqwest::Response, deadline: Instant, attempts: u32) -> HttpResponse {
    let status = response.status();
    let body = match tokio::time::timeout_at(deadline, response.bytes()).await {
        Ok(Ok(bytes)) if bytes.is_empty() => Value::Null,
        Ok(Ok(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            debug!("Response body (status {}) is not JSON: {}", status, e);
            Value::Null
        }),
        Ok(Err(e)) => {
            warn!("Failed to read response body (status {}): {}", status, e);
            Value::Null
        }
        Err(_) => {
            warn!("Timed out reading response body (status {})", status);
            Value::Null
        }
    };

    HttpResponse {
        status,
        body,
        attempts,
    }
}
