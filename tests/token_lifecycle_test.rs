// Integration tests: resolve a stored OAuth2 bundle, refresh it, and
// observe the refreshed tokens from a second resolver over the same database.

use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use toolgate::credentials::{CredentialStore, SqliteCredentialStore};
use toolgate::token::TokenOptions;
use toolgate::{
    CredentialKey, CredentialProfile, CredentialResolver, CredentialType, GatewayConfig, SourceMode,
    TokenManager,
};

const HOME: CredentialProfile =
    CredentialProfile::base_url("HOME_ASSISTANT_BASE_URL", "HOME_ASSISTANT_TOKEN");

fn resolver(store: Arc<dyn CredentialStore>, mode: SourceMode) -> CredentialResolver {
    CredentialResolver::new(store, mode, Arc::new(HashMap::<String, String>::new()))
}

#[tokio::test]
async fn test_refreshed_tokens_visible_to_other_instances() {
    let mut server = mockito::Server::new_async().await;
    let token_endpoint = server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at-2","refresh_token":"rt-2","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("credentials.db");
    let key = CredentialKey::new("home_assistant", "home_assistant", Some("tenant-1"));

    let first: Arc<dyn CredentialStore> = Arc::new(SqliteCredentialStore::new(&db_path, None).unwrap());
    first
        .save(
            &key,
            CredentialType::OAuth2,
            json!({
                "base_url": server.url(),
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "expires_at": Utc::now().timestamp() - 5
            })
            .as_object()
            .unwrap(),
            false,
        )
        .unwrap();

    // Shipped defaults, with a store opened without an encryption key
    let config = GatewayConfig::default();
    let credential = resolver(Arc::clone(&first), config.source_mode())
        .resolve(&key, &HOME)
        .unwrap();
    let manager = TokenManager::for_credential(
        key.clone(),
        &credential,
        Arc::clone(&first),
        reqwest::Client::new(),
        TokenOptions::from(&config),
    )
    .unwrap();

    let headers = manager.auth_header().await;
    assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer at-2"));
    token_endpoint.assert_async().await;

    // A second process opening the same database sees the rotated bundle
    let second: Arc<dyn CredentialStore> = Arc::new(SqliteCredentialStore::new(&db_path, None).unwrap());
    let reloaded = resolver(second, SourceMode::Strict)
        .resolve(&key, &HOME)
        .unwrap();
    let auth = reloaded.oauth2().unwrap();
    assert_eq!(reloaded.base_url(), Some(server.url().as_str()));
    assert_eq!(auth.access_token.as_deref(), Some("at-2"));
    assert_eq!(auth.refresh_token.as_deref(), Some("rt-2"));
    assert!(auth.expires_at.unwrap() > Utc::now().timestamp() + 3000);

    let stored = first.get(&key).unwrap().unwrap();
    assert!(!stored.encrypted);
}

#[tokio::test]
async fn test_strict_and_permissive_resolution() {
    let store: Arc<dyn CredentialStore> = Arc::new(SqliteCredentialStore::new(":memory:", None).unwrap());
    let key = CredentialKey::new("home_assistant", "home_assistant", Some("tenant-1"));

    let strict = resolver(Arc::clone(&store), SourceMode::Strict).resolve(&key, &HOME);
    assert!(strict.unwrap_err().is_fatal());

    let permissive = resolver(Arc::clone(&store), SourceMode::Permissive)
        .resolve(&key, &HOME)
        .unwrap();
    assert!(!permissive.is_configured());
    assert!(TokenManager::for_credential(
        key,
        &permissive,
        store,
        reqwest::Client::new(),
        TokenOptions::default()
    )
    .is_none());
}
