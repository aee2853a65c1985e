use std::{
    fmt,
    time::{Duration, SystemTime},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, TimestampSeconds};
use veil::Redact;

/// Short-lived bearer token for the Pipe API.
#[derive(Clone, PartialEq, Eq, Redact)]
pub struct SessionToken {
    #[redact(partial)]
    token: String,
    #[redact]
    authorization: HeaderValue,
    expires_at: SystemTime,
}

/// The claims of a JWT payload that we care about.
#[serde_as]
#[derive(Deserialize)]
struct Claims {
    #[serde_as(as = "Option<TimestampSeconds<i64, Flexible>>")]
    exp: Option<SystemTime>,
}

impl SessionToken {
    /// Wraps a token, or returns `None` if it cannot be sent as a header.
    #[must_use]
    pub fn new(token: &str, expires_at: SystemTime) -> Option<Self> {
        if token.is_empty() {
            return None;
        }

        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
        authorization.set_sensitive(true);

        Some(Self {
            token: token.to_owned(),
            authorization,
            expires_at,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Ready-made `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }

    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Whether the token expires within `margin` from now.
    ///
    /// Stale tokens are refreshed before use so that they cannot expire
    /// while a request is in flight.
    #[must_use]
    pub fn is_stale(&self, margin: Duration) -> bool {
        self.time_to_live() <= margin
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

/// Reads the `exp` claim from a JWT without verifying its signature.
///
/// Returns `None` when the token is not a JWT or has no expiry.
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<SystemTime> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature)) => payload,
        _ => return None,
    };

    // Some encoders keep the padding.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok()?.exp
}
