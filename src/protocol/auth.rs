//! Token exchange response types.
//!
//! `POST https://auth.deezer.com/login/arl` with the `arl` cookie answers
//! with a JSON body, even though it is served as `text/plain`:
//!
//! ```json
//! {
//!     "jwt": "eyJhbGciOiJFUzI1NiJ9.eyJleHAiOjE3MDAwMDAwMDB9.signature"
//! }
//! ```
//!
//! The token lifetime is normally only found in the JWT's own `exp` claim.
//! An explicit `expires_in` (seconds) takes precedence when present.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use veil::Redact;

/// JWT received in exchange for an ARL.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Redact)]
pub struct Jwt {
    /// The bearer token; empty or absent when the ARL was rejected
    #[redact]
    #[serde(default)]
    pub jwt: Option<String>,

    /// How long the token remains valid
    #[serde_as(as = "Option<DurationSeconds<u64, Flexible>>")]
    pub expires_in: Option<Duration>,
}
