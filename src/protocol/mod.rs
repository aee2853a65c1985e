//! Wire types for the Deezer services this crate talks to.
//!
//! # Submodules
//!
//! * [`auth`] - response of the ARL-for-JWT token exchange
//! * [`pipe`] - GraphQL request and response envelopes of the Pipe API
//!
//! # Shared Functionality
//!
//! [`json`] parses response bodies with consistent logging:
//!
//! * TRACE level with the parsed structure if successful
//! * TRACE level with the raw JSON if it does not match the expected type
//! * ERROR level with the raw text if the body is not JSON at all
//!
//! Types holding secrets derive `veil::Redact`, so tracing them is safe.

pub mod auth;
pub mod pipe;

use std::fmt::Debug;

use serde::Deserialize;

/// Parses and logs a JSON response body.
///
/// # Errors
///
/// Returns the `serde_json` error if the body is not valid JSON or does not
/// match `T`. Callers decide how that maps onto their error category.
pub fn json<T>(body: &str, origin: &str) -> Result<T, serde_json::Error>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e})");
                trace!("{body}");
            }
            Err(e)
        }
    }
}
