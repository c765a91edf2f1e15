//! Uniform result shape for every service call.
//!
//! - [`ApiEnvelope`] - `Success(T)` or `Failure(ApiError)`, serialized as
//!   `{ "success": true, "data": .. }` / `{ "success": false, "error": .. }`
//! - [`ApiError`] - Message, optional validation payload, [`ErrorKind`]
//! - [`Paginated`] - `{ results, count, next, previous }` for list endpoints
//!
//! Callers branch on the envelope, never on raw HTTP status codes.

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Coarse classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Every attempt ran into its deadline.
    Timeout,
    /// The server could not be reached.
    Network,
    /// Credentials were rejected and could not be refreshed.
    Unauthorized,
    /// 4xx with a (possibly structured) error payload.
    Validation,
    /// 5xx.
    Server,
    /// A 2xx body did not match the expected shape.
    Decode,
    /// The request could not be built.
    Config,
}

/// The failure half of an [`ApiEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable message.
    pub message: String,

    /// Backend validation payload, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,

    /// Failure classification.
    pub kind: ErrorKind,

    /// HTTP status, when a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Message used when every attempt timed out.
pub const TIMEOUT_MESSAGE: &str =
    "The server took too long to respond. Please check your connection and try again.";

/// Message used when the server could not be reached at all.
pub const NETWORK_MESSAGE: &str =
    "Could not reach the server. Please check your internet connection and try again.";

impl ApiError {
    /// Create an error of `kind` with `message`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: None,
            kind,
            status: None,
        }
    }

    /// All attempts timed out.
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, TIMEOUT_MESSAGE)
    }

    /// The server was unreachable.
    pub fn network() -> Self {
        Self::new(ErrorKind::Network, NETWORK_MESSAGE)
    }

    /// Build an error from a non-2xx response body.
    ///
    /// The message is extracted best effort from `message`, `detail`,
    /// `error`, then the first field error. The validation payload is the
    /// body's `errors` member when present, otherwise the whole object.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let kind = match status {
            401 => ErrorKind::Unauthorized,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Validation,
        };

        let message =
            extract_message(body).unwrap_or_else(|| default_status_message(status).to_string());

        let errors = match body {
            Value::Object(map) => match map.get("errors") {
                Some(errors) if !errors.is_null() => Some(errors.clone()),
                _ if map.is_empty() => None,
                _ => Some(body.clone()),
            },
            _ => None,
        };

        Self {
            message,
            errors,
            kind,
            status: Some(status),
        }
    }

    /// Attach the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

fn extract_message(body: &Value) -> Option<String> {
    let map = body.as_object()?;
    for key in ["message", "detail", "error"] {
        match map.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Object(inner)) => {
                if let Some(Value::String(s)) = inner.get("message") {
                    return Some(s.clone());
                }
            }
            _ => {}
        }
    }

    // Field errors: { "email": ["Enter a valid email address."] }
    let fields = map.get("errors").and_then(Value::as_object).unwrap_or(map);
    fields.iter().find_map(|(field, value)| {
        let first = match value {
            Value::Array(items) => items.first()?.as_str()?,
            Value::String(s) => s.as_str(),
            _ => return None,
        };
        if field == "non_field_errors" {
            Some(first.to_string())
        } else {
            Some(format!("{}: {}", field, first))
        }
    })
}

fn default_status_message(status: u16) -> &'static str {
    match status {
        400 => "The request was invalid.",
        401 => "Your session has expired. Please log in again.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        429 => "Too many requests. Please slow down and try again.",
        500..=599 => "The server encountered an error. Please try again later.",
        _ => "The request failed.",
    }
}

/// Uniform success/error wrapper returned by every service call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiEnvelope<T> {
    /// The call succeeded with a typed payload.
    Success(T),
    /// The call failed; never an `Err` past the client boundary.
    Failure(ApiError),
}

impl<T> ApiEnvelope<T> {
    /// Whether this is [`ApiEnvelope::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The payload, if successful.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    /// The error, if failed.
    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Convert into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(error) => Err(error),
        }
    }

    /// Map the success payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiEnvelope<U> {
        match self {
            Self::Success(data) => ApiEnvelope::Success(f(data)),
            Self::Failure(error) => ApiEnvelope::Failure(error),
        }
    }
}

impl<T> From<Result<T, ApiError>> for ApiEnvelope<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(error) => Self::Failure(error),
        }
    }
}

impl<T: Serialize> Serialize for ApiEnvelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ApiEnvelope", 2)?;
        match self {
            Self::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Failure(error) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    /// Items on this page.
    pub results: Vec<T>,
    /// Total number of items across all pages.
    pub count: u64,
    /// URL of the next page.
    pub next: Option<String>,
    /// URL of the previous page.
    pub previous: Option<String>,
}

impl<T> Paginated<T> {
    /// Whether there is a following page.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            count: 0,
            next: None,
            previous: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageRepr<T> {
    Page {
        results: Vec<T>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
    },
    Bare(Vec<T>),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Paginated<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match PageRepr::<T>::deserialize(deserializer)? {
            PageRepr::Page {
                results,
                count,
                next,
                previous,
            } => Self {
                count: count.unwrap_or(results.len() as u64),
                results,
                next,
                previous,
            },
            PageRepr::Bare(results) => Self {
                count: results.len() as u64,
                results,
                next: None,
                previous: None,
            },
        })
    }
}

/// Page selection for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

impl PageQuery {
    /// Page `page` with `page_size` items.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Query-string pairs.
    pub fn pairs(&self) -> [(&'static str, String); 2] {
        [
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ]
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(1, 12)
    }
}
