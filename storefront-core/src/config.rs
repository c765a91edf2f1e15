//! Client configuration.
//!
//! Configuration is read from a TOML file (by default `config.toml` in the
//! platform config directory) and then overridden by environment variables:
//!
//! | variable                  | field          |
//! |---------------------------|----------------|
//! | `STOREFRONT_API_URL`      | `api_url`      |
//! | `STOREFRONT_AUTH_SCHEME`  | `auth_scheme`  |
//! | `STOREFRONT_AUTH_MODE`    | `auth_mode`    |
//! | `STOREFRONT_TIMEOUT_MS`   | `timeout_ms`   |
//! | `STOREFRONT_RETRIES`      | `retries`      |
//!
//! # Example
//!
//! ```toml
//! api_url = "https://shop.example.com/api/"
//! auth_mode = "bearer"
//! timeout_ms = 12000
//! retries = 2
//! refresh_leeway_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ClientConfig`].
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A field holds an unusable value.
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// How the client authenticates protected calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: <scheme> <access token>` from the credential store.
    #[default]
    Bearer,
    /// Session cookies in the client's cookie jar; no bearer header.
    Cookie,
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bearer" | "token" | "jwt" => Ok(Self::Bearer),
            "cookie" | "cookies" | "session" => Ok(Self::Cookie),
            other => Err(ConfigError::Invalid {
                field: "auth_mode",
                message: format!("unknown auth mode: {}", other),
            }),
        }
    }
}

/// Settings shared by every request the client issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL all endpoint paths are joined onto.
    pub api_url: String,

    /// Scheme word in the `Authorization` header.
    pub auth_scheme: String,

    /// Bearer header or cookie session.
    pub auth_mode: AuthMode,

    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,

    /// Additional attempts after a transient failure.
    pub retries: u32,

    /// First backoff delay in milliseconds; doubles per retry.
    pub backoff_base_ms: u64,

    /// Refresh before dispatch when the access token expires within this
    /// many seconds. Unset disables proactive refresh.
    pub refresh_leeway_secs: Option<u64>,

    /// Cookie holding the anti-forgery token.
    pub csrf_cookie: String,

    /// Header the anti-forgery token is sent in.
    pub csrf_header: String,

    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api/".to_string(),
            auth_scheme: "Bearer".to_string(),
            auth_mode: AuthMode::Bearer,
            timeout_ms: 12_000,
            retries: 2,
            backoff_base_ms: 300,
            refresh_leeway_secs: None,
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            user_agent: format!("storefront/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointing at `api_url`.
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "storefront", "storefront")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path` (or defaults when it does not exist), apply
    /// environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("STOREFRONT_API_URL") {
            self.api_url = url;
        }
        if let Some(scheme) = lookup("STOREFRONT_AUTH_SCHEME") {
            self.auth_scheme = scheme;
        }
        if let Some(mode) = lookup("STOREFRONT_AUTH_MODE") {
            self.auth_mode = mode.parse()?;
        }
        if let Some(timeout) = lookup("STOREFRONT_TIMEOUT_MS") {
            self.timeout_ms = parse_number("timeout_ms", &timeout)?;
        }
        if let Some(retries) = lookup("STOREFRONT_RETRIES") {
            self.retries = parse_number("retries", &retries)?;
        }
        Ok(())
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.auth_scheme.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "auth_scheme",
                message: "must not be empty".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The API base as a URL with a trailing slash, so relative endpoint
    /// paths join underneath it.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.api_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            field: "api_url",
            message: format!("{}: {}", self.api_url, e),
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                field: "api_url",
                message: format!("{} cannot be used as a base URL", self.api_url),
            });
        }
        Ok(url)
    }

    /// Per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// First backoff delay.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Proactive refresh window, if enabled.
    pub fn refresh_leeway(&self) -> Option<chrono::Duration> {
        self.refresh_leeway_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(chrono::Duration::seconds)
    }
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        message: format!("{}: {}", raw, e),
    })
}
