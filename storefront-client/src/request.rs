use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use storefront_core::PageQuery;

/// Per-call overrides of the client's retry policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Per-attempt deadline.
    pub timeout: Option<Duration>,
    /// Additional attempts after a transient failure.
    pub retries: Option<u32>,
}

/// One logical call against the backend.
///
/// Paths are relative to the configured API base (`"cart/items/3/"`).
///
/// ```
/// use storefront_client::ApiRequest;
///
/// let request = ApiRequest::post("cart/add/")
///     .json(&serde_json::json!({ "product_id": 12, "quantity": 2 }))
///     .retries(0);
/// assert_eq!(request.path, "cart/add/");
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: Method,
    /// Endpoint path relative to the API base.
    pub path: String,
    /// Query-string pairs.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
    /// Extra headers for this call.
    pub headers: HeaderMap,
    /// Public endpoints never carry the bearer token and never trigger a
    /// refresh.
    pub public: bool,
    /// Retry policy overrides.
    pub options: RequestOptions,
    invalid: Option<String>,
}

impl ApiRequest {
    /// A request with `method` against `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            public: false,
            options: RequestOptions::default(),
            invalid: None,
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `PATCH path`.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(value),
            Err(e) => self.invalid = Some(format!("failed to serialize request body: {}", e)),
        }
        self
    }

    /// Append one query pair.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query pair when `value` is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Append `page` and `page_size`.
    pub fn page(mut self, page: PageQuery) -> Self {
        for (key, value) in page.pairs() {
            self.query.push((key.to_string(), value));
        }
        self
    }

    /// Add a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.invalid = Some(format!("invalid header {}", name)),
        }
        self
    }

    /// Mark the endpoint as public.
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Override the per-attempt deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Override the number of retries.
    pub fn retries(mut self, retries: u32) -> Self {
        self.options.retries = Some(retries);
        self
    }

    /// Why this request cannot be sent, if it cannot.
    pub fn build_error(&self) -> Option<&str> {
        self.invalid.as_deref()
    }
}
