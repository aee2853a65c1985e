//! Client for the Deezer Pipe GraphQL API.
//!
//! [`Client`] sends GraphQL requests with the bearer token provided by its
//! [`TokenManager`] and classifies the responses into data or errors.
//!
//! # Authentication Retry
//!
//! When the Pipe API rejects the token (HTTP 401, or an error payload with an
//! authentication code), the client invalidates the token, acquires a new one
//! and sends the request exactly once more. If that is rejected as well, the
//! caller receives [`Error::Authentication`]. No other error is retried.
//!
//! Only the rejected token is discarded. Requests rejected concurrently with
//! the same token wait for one shared replacement.
//!
//! # Example
//!
//! ```rust
//! use deezer_pipe::{arl::Arl, config::Config, error::Result, pipe::Client};
//! use serde_json::json;
//!
//! async fn example() -> Result<()> {
//!     let config = Config::with_arl(Arl::from_env()?);
//!     let client = Client::new(&config)?;
//!
//!     let data = client
//!         .execute(
//!             "query($id: String!) { track(trackId: $id) { title } }",
//!             Some(json!({ "id": "3135556" })),
//!         )
//!         .await?;
//!     println!("{}", data["track"]["title"]);
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use url::Url;

use crate::{
    auth::{excerpt, TokenManager},
    config::Config,
    error::{Error, Result},
    http::Client as HttpClient,
    protocol::{
        self,
        pipe::{Query, Request, Response},
    },
    token::SessionToken,
};

/// GraphQL client bound to one ARL and its session token.
pub struct Client {
    http_client: Arc<HttpClient>,
    tokens: TokenManager,
    pipe_url: Url,
}

/// Result of sending a request once.
#[derive(Debug)]
enum Attempt {
    /// The `data` member of a successful response.
    Accepted(serde_json::Value),

    /// The session token was not accepted.
    Rejected(Error),
}

impl Client {
    /// Creates a client. No request is made until the first query.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Arc::new(HttpClient::new(config)?);
        let tokens = TokenManager::new(config, Arc::clone(&http_client));

        Ok(Self {
            http_client,
            tokens,
            pipe_url: config.pipe_url.clone(),
        })
    }

    /// The GraphQL endpoint.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.pipe_url
    }

    /// The token manager supplying this client's session tokens.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Executes a GraphQL query and returns its `data` member.
    ///
    /// # Errors
    ///
    /// * [`Error::Authentication`] if no token can be acquired, or if the
    ///   request is rejected both with the cached and with a fresh token
    /// * [`Error::Transport`] on network failures, unexpected statuses and
    ///   malformed responses
    /// * [`Error::GraphQL`] if the response carries errors
    pub async fn execute(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let request = Request {
            operation_name: None,
            query,
            variables,
        };

        self.send(&request).await
    }

    /// Executes a typed operation.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus [`Error::InvalidArgument`] if the
    /// variables cannot be serialized and [`Error::Transport`] if `data`
    /// does not match `Q::Data`.
    pub async fn query<Q: Query>(&self, variables: &Q::Variables) -> Result<Q::Data> {
        let request = Request {
            operation_name: Some(Q::OPERATION_NAME),
            query: Q::DOCUMENT,
            variables: Some(variables),
        };

        let data = self.send(&request).await?;
        serde_json::from_value(data).map_err(|e| {
            Error::transport(
                &self.pipe_url,
                None,
                format!("unexpected {} data: {e}", Q::OPERATION_NAME),
            )
        })
    }

    /// Sends a request, refreshing the token and retrying once if it is
    /// rejected.
    async fn send<V: Serialize>(&self, request: &Request<'_, V>) -> Result<serde_json::Value> {
        let body = serde_json::to_vec(request)
            .map_err(|e| Error::InvalidArgument(format!("variables cannot be serialized: {e}")))?;

        let token = self.tokens.get_token().await?;
        match self.attempt(&token, &body).await? {
            Attempt::Accepted(data) => return Ok(data),
            Attempt::Rejected(reason) => {
                warn!("{reason}; retrying with a new session token");
                self.tokens.invalidate_token(&token);
            }
        }

        let token = self.tokens.get_token().await?;
        match self.attempt(&token, &body).await? {
            Attempt::Accepted(data) => Ok(data),
            Attempt::Rejected(reason) => Err(reason),
        }
    }

    async fn attempt(&self, token: &SessionToken, body: &[u8]) -> Result<Attempt> {
        let mut request = self.http_client.post(self.pipe_url.clone(), body.to_vec());
        let headers = request.headers_mut();
        let json_content = HeaderValue::from_static("application/json");
        headers.insert(CONTENT_TYPE, json_content.clone());
        headers.insert(ACCEPT, json_content);
        headers.insert(AUTHORIZATION, token.authorization().clone());

        let response = self.http_client.execute(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        get_data(&self.pipe_url, status, &body)
    }
}

/// Classifies a GraphQL response.
fn get_data(endpoint: &Url, status: u16, body: &str) -> Result<Attempt> {
    const UNAUTHORIZED: u16 = 401;

    if status == UNAUTHORIZED {
        return Ok(Attempt::Rejected(Error::authentication(
            endpoint,
            Some(status),
            format!("session token rejected: {}", excerpt(body)),
        )));
    }

    if !(200..300).contains(&status) {
        return Err(Error::transport(endpoint, Some(status), excerpt(body)));
    }

    let response = protocol::json::<Response>(body, "pipe").map_err(|e| {
        Error::transport(endpoint, Some(status), format!("invalid response: {e}"))
    })?;

    match response {
        Response {
            errors: Some(errors),
            ..
        } if !errors.is_empty() => {
            if let Some(error) = errors.iter().find(|error| error.is_authentication()) {
                return Ok(Attempt::Rejected(Error::authentication(
                    endpoint,
                    Some(status),
                    format!("session token rejected: {}", error.message),
                )));
            }

            Err(Error::GraphQL {
                endpoint: endpoint.to_string(),
                errors,
            })
        }
        Response {
            data: Some(data), ..
        } => Ok(Attempt::Accepted(data)),
        Response { .. } => Err(Error::transport(
            endpoint,
            Some(status),
            "invalid response: neither data nor errors received",
        )),
    }
}
