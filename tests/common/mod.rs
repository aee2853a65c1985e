//! Shared helpers for tests against mock Deezer endpoints.

#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use deezer_pipe::{Client, Config};
use serde_json::json;
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const AUTH_PATH: &str = "/login/arl";
pub const PIPE_PATH: &str = "/api";

/// Initializes logging once per test binary.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Configuration pointing both endpoints at the mock server.
pub fn config(server: &MockServer, arl: &str) -> Config {
    init_logger();

    let base: Url = server.uri().parse().unwrap();
    Config::with_arl(arl.parse().unwrap())
        .with_endpoints(base.join(AUTH_PATH).unwrap(), base.join(PIPE_PATH).unwrap())
}

pub fn client(server: &MockServer, arl: &str) -> Client {
    Client::new(&config(server, arl)).unwrap()
}

/// Builds an unsigned JWT expiring at `exp` seconds since the epoch.
pub fn make_jwt(exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string());
    format!("{header}.{payload}.fake_signature")
}

/// Seconds since the epoch, `offset` seconds from now.
pub fn epoch_in(offset: u64) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + offset
}

/// Token exchange response as served by Deezer: JSON as `text/plain`.
pub fn jwt_response(jwt: &str, expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(json!({ "jwt": jwt, "expires_in": expires_in }).to_string())
}

/// Mock for the token exchange endpoint.
pub fn auth_mock() -> wiremock::MockBuilder {
    Mock::given(method("POST")).and(path(AUTH_PATH))
}

/// Mock for the GraphQL endpoint.
pub fn pipe_mock() -> wiremock::MockBuilder {
    Mock::given(method("POST")).and(path(PIPE_PATH))
}
