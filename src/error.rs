//! Error handling for the Pipe client.
//!
//! Errors fall into three categories that callers can act on without
//! inspecting internals:
//!
//! * [`Error::Authentication`] - the ARL was rejected, the token exchange
//!   failed, or the Pipe API rejected a freshly acquired token
//! * [`Error::Transport`] - the endpoint could not be reached, answered
//!   with an unexpected status, or returned a malformed body
//! * [`Error::GraphQL`] - the Pipe API returned a well-formed error payload
//!   that is unrelated to authentication
//!
//! Invalid configuration, such as a malformed ARL, is reported as
//! [`Error::Config`] and variables that cannot be serialized as
//! [`Error::InvalidArgument`], both before any request is made.
//!
//! Every network-related variant carries the endpoint it concerns and, when
//! available, the HTTP status code.
//!
//! # Example
//!
//! ```rust
//! use deezer_pipe::{error::Result, Client};
//!
//! async fn fetch(client: &Client) -> Result<()> {
//!     match client.execute("{ me { id } }", None).await {
//!         Ok(data) => println!("{data}"),
//!         Err(e) if e.is_authentication() => eprintln!("refresh your arl: {e}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

use thiserror::Error;

use crate::protocol::pipe::GraphQLError;

/// Main error type of the Pipe client.
///
/// `Clone` so that a single failed token exchange can be handed to every
/// caller that was waiting on it.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Authentication failed and could not be recovered.
    #[error("authentication failed at {endpoint}{}: {message}", StatusSuffix(.status))]
    Authentication {
        /// URL of the endpoint that rejected the request
        endpoint: String,
        /// HTTP status code, if a response was received
        status: Option<u16>,
        /// Description of the failure
        message: String,
    },

    /// The request could not be completed at the HTTP level.
    #[error("transport error at {endpoint}{}: {message}", StatusSuffix(.status))]
    Transport {
        /// URL of the endpoint that was being contacted
        endpoint: String,
        /// HTTP status code, if a response was received
        status: Option<u16>,
        /// Description of the failure
        message: String,
    },

    /// The GraphQL endpoint returned one or more errors.
    #[error("GraphQL error at {endpoint}: {}", JoinedMessages(.errors))]
    GraphQL {
        /// URL of the GraphQL endpoint
        endpoint: String,
        /// Errors as returned by the server, in order
        errors: Vec<GraphQLError>,
    },

    /// The client was configured with invalid values.
    #[error("configuration error: {0}")]
    Config(String),

    /// A request could not be built from the arguments given.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Standard result type for Pipe client operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates an authentication error.
    pub fn authentication(
        endpoint: impl fmt::Display,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Authentication {
            endpoint: endpoint.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(
        endpoint: impl fmt::Display,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error means the credentials are no longer usable.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// The HTTP status code associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Transport { status, .. } => *status,
            Self::GraphQL { .. } | Self::Config(_) | Self::InvalidArgument(_) => None,
        }
    }

    /// The endpoint this error concerns, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Authentication { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::GraphQL { endpoint, .. } => Some(endpoint),
            Self::Config(_) | Self::InvalidArgument(_) => None,
        }
    }
}

/// Formats an optional status code as ` (status 401)`.
struct StatusSuffix<'a>(&'a Option<u16>);

impl fmt::Display for StatusSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(status) => write!(f, " (status {status})"),
            None => Ok(()),
        }
    }
}

struct JoinedMessages<'a>(&'a [GraphQLError]);

impl fmt::Display for JoinedMessages<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&error.message)?;
        }
        Ok(())
    }
}

/// Converts HTTP client errors into transport errors.
///
/// The endpoint and status are taken from the `reqwest` error when it
/// carries them. Timeouts, connection failures and body errors all end up
/// here.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map_or_else(|| String::from("<unknown>"), ToString::to_string);
        let status = err.status().map(|status| status.as_u16());

        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };

        Self::Transport {
            endpoint,
            status,
            message,
        }
    }
}

/// Converts IO errors from reading secrets into configuration errors.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Converts secrets file parsing errors into configuration errors.
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
