use manual_catalog_core::auth::{
    CredentialCache, TokenProvider, ACCESS_TOKEN_ENV, REFRESH_TOKEN_ENV,
};
use manual_catalog_core::config::AuthConfig;
use manual_catalog_core::error::AuthError;
use serde_json::json;
use serial_test::serial;
use std::env;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn auth_config(authority: &str, cache: &Path) -> AuthConfig {
    AuthConfig {
        tenant_id: "tenant-1".into(),
        client_id: "client-1".into(),
        scopes: vec!["Sites.Read.All".into(), "Files.ReadWrite.All".into()],
        login_hint: "support@example.com".into(),
        credential_cache: cache.to_path_buf(),
        authority: authority.into(),
    }
}

fn clear_env() {
    env::remove_var(ACCESS_TOKEN_ENV);
    env::remove_var(REFRESH_TOKEN_ENV);
}

#[tokio::test]
#[serial]
async fn access_token_from_environment_wins() {
    clear_env();
    let dir = tempdir().unwrap();
    env::set_var(ACCESS_TOKEN_ENV, "env-token");

    let provider = TokenProvider::new(
        reqwest::Client::new(),
        auth_config("http://127.0.0.1:1", &dir.path().join("cache.json")),
    );
    let token = provider.access_token().await.expect("env token should be used");
    assert_eq!(token, "env-token");
    clear_env();
}

#[tokio::test]
#[serial]
async fn cached_refresh_token_is_redeemed_and_rotated() {
    clear_env();
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    CredentialCache {
        refresh_token: "old-refresh".into(),
        account: Some("support@example.com".into()),
    }
    .save(&cache_path)
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .and(body_string_contains("offline_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "refresh_token": "new-refresh",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = TokenProvider::new(reqwest::Client::new(), auth_config(&server.uri(), &cache_path));
    let token = provider.access_token().await.expect("refresh should succeed");
    assert_eq!(token, "fresh-access");

    let cache = CredentialCache::load(&cache_path).unwrap().expect("cache present");
    assert_eq!(cache.refresh_token, "new-refresh");
    assert_eq!(cache.account.as_deref(), Some("support@example.com"));
}

#[tokio::test]
#[serial]
async fn refresh_token_from_environment_is_used_without_cache() {
    clear_env();
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    env::set_var(REFRESH_TOKEN_ENV, "env-refresh");

    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=env-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access"
        })))
        .mount(&server)
        .await;

    let provider = TokenProvider::new(reqwest::Client::new(), auth_config(&server.uri(), &cache_path));
    assert_eq!(provider.access_token().await.unwrap(), "fresh-access");
    assert!(
        !cache_path.exists(),
        "cache is only written when a rotated refresh token is returned"
    );
    clear_env();
}

#[tokio::test]
#[serial]
async fn missing_credentials_name_the_login_hint() {
    clear_env();
    let dir = tempdir().unwrap();
    let provider = TokenProvider::new(
        reqwest::Client::new(),
        auth_config("http://127.0.0.1:1", &dir.path().join("cache.json")),
    );
    match provider.access_token().await {
        Err(AuthError::NoCredential { login_hint }) => {
            assert_eq!(login_hint, "support@example.com")
        }
        other => panic!("expected NoCredential, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn rejected_refresh_is_an_error() {
    clear_env();
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    CredentialCache {
        refresh_token: "expired".into(),
        account: None,
    }
    .save(&cache_path)
    .unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let provider = TokenProvider::new(reqwest::Client::new(), auth_config(&server.uri(), &cache_path));
    match provider.access_token().await {
        Err(AuthError::Rejected { status, body, .. }) => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(body, "invalid_grant");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}
