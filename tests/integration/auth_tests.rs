use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;
use wo::WoError;
use wo::auth::{ChainedCredential, ClientSecretCredential, TokenCredential};
use wo::test_utils::StaticTokenCredential;

const SCOPE: &str = "https://management.azure.com/.default";

#[test]
fn client_secret_exchanges_for_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/tenant-1/oauth2/v2.0/token")
            .header("content-type", "application/x-www-form-urlencoded");
        then.status(200).json_body(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "sp-token"
        }));
    });

    let credential =
        ClientSecretCredential::new(server.base_url(), "tenant-1", "client", "s3cr3t&=").unwrap();
    let token = credential.get_token(SCOPE).unwrap();
    assert_eq!(token.secret(), "sp-token");
    assert!(token.expires_at().is_some());
    mock.assert();
}

#[test]
fn rejected_secret_is_auth_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/tenant-1/oauth2/v2.0/token");
        then.status(401).body(r#"{"error":"invalid_client"}"#);
    });

    let credential =
        ClientSecretCredential::new(server.base_url(), "tenant-1", "client", "wrong").unwrap();
    let err = credential.get_token(SCOPE).unwrap_err();
    assert!(matches!(err, WoError::Auth(ref msg) if msg.contains("401")));
}

#[test]
fn chain_prefers_first_working_source() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/tenant-1/oauth2/v2.0/token");
        then.status(200)
            .json_body(json!({"access_token": "sp-token", "expires_in": 3600}));
    });

    let fallback = Arc::new(StaticTokenCredential::new("fallback"));
    let primary: Arc<dyn TokenCredential> = Arc::new(
        ClientSecretCredential::new(server.base_url(), "tenant-1", "client", "secret").unwrap(),
    );
    let secondary: Arc<dyn TokenCredential> = fallback.clone();
    let chain = ChainedCredential::new(vec![primary, secondary]);
    assert_eq!(chain.get_token(SCOPE).unwrap().secret(), "sp-token");
    assert_eq!(fallback.calls(), 0);
}
