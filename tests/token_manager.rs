//! Token manager tests against a mock token exchange endpoint.

mod common;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::{auth_mock, client, epoch_in, jwt_response, make_jwt, pipe_mock};
use futures_util::future::join_all;
use wiremock::{matchers::header, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_first_call_exchanges_then_reuses() {
    let server = MockServer::start().await;

    auth_mock()
        .and(header("cookie", "arl=cookie-abc"))
        .respond_with(jwt_response("jwt-1", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let tokens = client.tokens();

    assert!(tokens.cached().is_none());
    assert_eq!(tokens.get_token().await.unwrap().as_str(), "jwt-1");
    assert_eq!(tokens.get_token().await.unwrap().as_str(), "jwt-1");
}

#[tokio::test]
async fn test_concurrent_calls_share_one_exchange() {
    let server = MockServer::start().await;

    auth_mock()
        .respond_with(jwt_response("jwt-1", 3600).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let tokens = client.tokens();

    let results = join_all((0..10).map(|_| tokens.get_token())).await;

    assert_eq!(results.len(), 10);
    for result in results {
        assert_eq!(result.unwrap().as_str(), "jwt-1");
    }
}

#[tokio::test]
async fn test_concurrent_calls_share_one_failure() {
    let server = MockServer::start().await;

    auth_mock()
        .respond_with(ResponseTemplate::new(403).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let tokens = client.tokens();

    let results = join_all((0..5).map(|_| tokens.get_token())).await;

    for result in results {
        let err = result.unwrap_err();
        assert!(err.is_authentication(), "{err}");
        assert_eq!(err.status(), Some(403));
    }
}

#[tokio::test]
async fn test_invalidate_forces_exactly_one_exchange() {
    let server = MockServer::start().await;

    auth_mock()
        .respond_with(jwt_response("jwt-1", 3600))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    auth_mock()
        .respond_with(jwt_response("jwt-2", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let tokens = client.tokens();

    assert_eq!(tokens.get_token().await.unwrap().as_str(), "jwt-1");

    tokens.invalidate();
    assert!(tokens.cached().is_none());

    let (a, b) = tokio::join!(tokens.get_token(), tokens.get_token());
    assert_eq!(a.unwrap().as_str(), "jwt-2");
    assert_eq!(b.unwrap().as_str(), "jwt-2");
    assert_eq!(tokens.get_token().await.unwrap().as_str(), "jwt-2");
}

#[tokio::test]
async fn test_expiry_is_read_from_jwt_claim() {
    let server = MockServer::start().await;

    let exp = epoch_in(600);
    let jwt = make_jwt(exp);
    auth_mock()
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(r#"{{"jwt":"{jwt}"}}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let token = client.tokens().get_token().await.unwrap();

    assert_eq!(token.as_str(), jwt);
    assert_eq!(token.expires_at(), UNIX_EPOCH + Duration::from_secs(exp));
}

#[tokio::test]
async fn test_token_arriving_within_margin_is_exchanged_again() {
    let server = MockServer::start().await;

    // Valid for 10 seconds: inside the 30 second margin on arrival.
    auth_mock()
        .respond_with(jwt_response("jwt-short", 10))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    auth_mock()
        .respond_with(jwt_response("jwt-long", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let tokens = client.tokens();

    assert_eq!(tokens.get_token().await.unwrap().as_str(), "jwt-long");
    assert_eq!(tokens.get_token().await.unwrap().as_str(), "jwt-long");
}

#[tokio::test]
async fn test_abandoned_exchange_is_not_resumed_after_timeout() {
    let server = MockServer::start().await;

    auth_mock()
        .respond_with(jwt_response("jwt-1", 3600).set_delay(Duration::from_millis(200)))
        .expect(1..=2)
        .mount(&server)
        .await;

    let mut config = common::config(&server, "cookie-abc");
    config.timeout = Duration::from_secs(1);
    let client = deezer_pipe::Client::new(&config).unwrap();
    let tokens = client.tokens();

    let abandoned = tokio::time::timeout(Duration::from_millis(50), tokens.get_token()).await;
    assert!(abandoned.is_err());
    assert!(tokens.cached().is_none());

    // Longer than the request timeout of the abandoned exchange.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let token = tokens.get_token().await.unwrap();
    assert_eq!(token.as_str(), "jwt-1");
    assert_eq!(tokens.cached().unwrap().as_str(), "jwt-1");
}

#[tokio::test]
async fn test_abandoned_call_does_not_disturb_other_waiters() {
    let server = MockServer::start().await;

    auth_mock()
        .respond_with(jwt_response("jwt-1", 3600).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let tokens = client.tokens();

    let (abandoned, token) = tokio::join!(
        tokio::time::timeout(Duration::from_millis(50), tokens.get_token()),
        tokens.get_token(),
    );

    assert!(abandoned.is_err());
    assert_eq!(token.unwrap().as_str(), "jwt-1");
    assert_eq!(tokens.get_token().await.unwrap().as_str(), "jwt-1");
}

#[tokio::test]
async fn test_rejected_arl_is_authentication_error() {
    let server = MockServer::start().await;

    auth_mock()
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"jwt":""}"#))
        .expect(1)
        .mount(&server)
        .await;
    pipe_mock()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let err = client.execute("{ me { id } }", None).await.unwrap_err();

    assert!(err.is_authentication(), "{err}");
    assert!(err.endpoint().unwrap().ends_with("/login/arl"));
}

#[tokio::test]
async fn test_malformed_exchange_response_is_authentication_error() {
    let server = MockServer::start().await;

    auth_mock()
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, "cookie-abc");
    let err = client.tokens().get_token().await.unwrap_err();

    assert!(err.is_authentication(), "{err}");
    assert!(err.to_string().contains("malformed response"), "{err}");
}

#[tokio::test]
async fn test_clients_do_not_share_tokens() {
    let server = MockServer::start().await;

    auth_mock()
        .and(header("cookie", "arl=cookie-abc"))
        .respond_with(jwt_response("jwt-abc", 3600))
        .expect(1)
        .mount(&server)
        .await;
    auth_mock()
        .and(header("cookie", "arl=cookie-xyz"))
        .respond_with(jwt_response("jwt-xyz", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let first = client(&server, "cookie-abc");
    let second = client(&server, "cookie-xyz");

    assert_eq!(first.tokens().get_token().await.unwrap().as_str(), "jwt-abc");
    assert_eq!(second.tokens().get_token().await.unwrap().as_str(), "jwt-xyz");

    first.tokens().invalidate();
    assert!(first.tokens().cached().is_none());
    assert_eq!(second.tokens().cached().unwrap().as_str(), "jwt-xyz");

    let expires_at = second.tokens().cached().unwrap().expires_at();
    assert!(expires_at > SystemTime::now() + Duration::from_secs(3000));
}
