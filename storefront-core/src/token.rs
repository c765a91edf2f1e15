//! Access token inspection.
//!
//! The backend issues JWTs. The client never verifies signatures (it holds
//! no key); it only peeks at the payload to answer liveness questions:
//! - [`TokenClaims::decode`] - Defensive payload decoding
//! - [`is_token_expired`] - Malformed tokens count as expired
//! - [`expires_within`] - Used by the opt-in proactive refresh
//!
//! Staleness is ultimately discovered by the server answering 401, not by
//! the local clock.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The subset of JWT claims the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,

    /// Issue time as seconds since the Unix epoch.
    #[serde(default)]
    pub iat: Option<i64>,

    /// Subject, when the issuer sets one.
    #[serde(default)]
    pub sub: Option<String>,

    /// User id claim used by the backend's JWT library.
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<String>,

    /// `access` or `refresh`.
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT.
    ///
    /// Returns `None` for anything that is not three dot-separated segments
    /// with a base64url JSON object in the middle.
    pub fn decode(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let (_header, payload, _signature) =
            (segments.next()?, segments.next()?, segments.next()?);
        if segments.next().is_some() || payload.is_empty() {
            return None;
        }

        // Some issuers pad the segments anyway.
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Expiry as a timestamp, if the token carries a usable `exp`.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// User identifier from `user_id`, falling back to `sub`.
    pub fn subject(&self) -> Option<&str> {
        self.user_id.as_deref().or(self.sub.as_deref())
    }
}

/// Accept numeric or string ids.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Whether `token` should be considered expired.
///
/// - A token whose payload cannot be decoded is expired.
/// - A token without an `exp` claim is not expired.
/// - Otherwise it is expired once `exp` is in the past.
pub fn is_token_expired(token: &str) -> bool {
    match TokenClaims::decode(token) {
        Some(claims) => match claims.exp {
            Some(_) => claims
                .expires_at()
                .map(|exp| exp <= Utc::now())
                .unwrap_or(true),
            None => false,
        },
        None => true,
    }
}

/// Whether `token` is expired or will expire within `leeway`.
///
/// Same decoding rules as [`is_token_expired`].
pub fn expires_within(token: &str, leeway: Duration) -> bool {
    match TokenClaims::decode(token) {
        Some(claims) => match claims.exp {
            Some(_) => claims
                .expires_at()
                .map(|exp| exp <= Utc::now() + leeway)
                .unwrap_or(true),
            None => false,
        },
        None => true,
    }
}

/// Build an unsigned JWT carrying `claims`.
///
/// Only useful for tests and fixtures; the backend would reject it.
pub fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}
