//! GraphQL envelopes of the Deezer Pipe API.
//!
//! Requests are standard GraphQL POST bodies:
//!
//! ```json
//! {
//!     "operationName": "GetTrack",
//!     "query": "query GetTrack($id: String!) { track(trackId: $id) { title } }",
//!     "variables": { "id": "3135556" }
//! }
//! ```
//!
//! Responses carry `data`, `errors` or both:
//!
//! ```json
//! {
//!     "data": null,
//!     "errors": [
//!         {
//!             "message": "Track not found",
//!             "locations": [{ "line": 1, "column": 1 }],
//!             "path": ["track"],
//!             "extensions": { "code": "NOT_FOUND" }
//!         }
//!     ]
//! }
//! ```

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

/// Defines a GraphQL operation against the Pipe API.
///
/// Operations are generated from `.graphql` files; each implementing type
/// carries the document and the types of its variables and result.
///
/// # Examples
///
/// ```rust
/// use deezer_pipe::protocol::pipe::Query;
///
/// struct GetMe;
///
/// impl Query for GetMe {
///     const OPERATION_NAME: &'static str = "GetMe";
///     const DOCUMENT: &'static str = "query GetMe { me { id } }";
///     type Variables = serde_json::Value;
///     type Data = serde_json::Value;
/// }
/// ```
pub trait Query {
    /// Name of the operation within [`Query::DOCUMENT`].
    const OPERATION_NAME: &'static str;

    /// GraphQL document text.
    const DOCUMENT: &'static str;

    /// Variables sent along with the document.
    type Variables: Serialize;

    /// Shape of the `data` member of a successful response.
    type Data: DeserializeOwned + Debug;
}

/// GraphQL request body.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<'a, V> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<V>,
}

/// GraphQL response body.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

/// A single error from the `errors` member of a response.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
    #[serde(default)]
    pub extensions: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Position of an error in the GraphQL document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Location {
    pub line: u64,
    pub column: u64,
}

impl GraphQLError {
    /// Error codes that mean the bearer token was not accepted.
    const AUTHENTICATION_CODES: [&'static str; 3] = ["UNAUTHENTICATED", "UNAUTHORIZED", "JWT_EXPIRED"];

    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }

    /// The `extensions.code` value, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code"))
            .and_then(serde_json::Value::as_str)
    }

    /// Whether this error rejects the bearer token rather than the query.
    ///
    /// Only the machine-readable code is considered: a message like
    /// "Unauthorized" on a single field is a permission problem of that
    /// field, not of the session.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        self.code().is_some_and(|code| {
            Self::AUTHENTICATION_CODES
                .iter()
                .any(|auth_code| code.eq_ignore_ascii_case(auth_code))
        })
    }
}
