//! Mock KIS server tests.
//!
//! These tests use wiremock to stand in for the KIS token and condition
//! search endpoints, so the session lifecycle and the fail-soft search
//! contract can be checked without network access or real app keys.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use kisscreen_core::{
    ApiError, ClientConfig, Credential, Environment, KisClient, SessionManager, TokenCache,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/oauth2/tokenP";
const SEARCH_PATH: &str = "/uapi/domestic-stock/v1/quotations/psearch-result";

fn config(server: &MockServer, dir: &TempDir, environment: Environment) -> ClientConfig {
    ClientConfig::new(
        "test_key",
        "test_secret",
        "12345678",
        "test_user",
        environment,
        dir.path().join("token.json"),
    )
    .with_base_url(server.uri())
    .with_timeout(Duration::from_millis(500))
}

fn seed_cache(path: &Path, token: &str, expires_in: chrono::Duration) {
    TokenCache::new(path)
        .save(&Credential::new(token, Utc::now() + expires_in))
        .unwrap();
}

async fn mount_token(server: &MockServer, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_json(json!({
            "grant_type": "client_credentials",
            "appkey": "test_key",
            "appsecret": "test_secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 86400,
            "access_token_token_expired": "2030-01-01 09:00:00"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_token_failure(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server Error"))
        .mount(server)
        .await;
}

async fn mount_search(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_renew_sets_expiry_with_margin_and_persists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "fresh_token", 1).await;

    let mut session = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    let before = Utc::now();
    session.renew().await.unwrap();
    let after = Utc::now();

    let credential = session.credential().unwrap();
    assert_eq!(credential.token, "fresh_token");
    let lifetime = chrono::Duration::seconds(86400 - 60);
    assert!(credential.expires_at >= before + lifetime);
    assert!(credential.expires_at <= after + lifetime);

    let cached = TokenCache::new(dir.path().join("token.json"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(cached.token, "fresh_token");
    assert!((cached.expires_at - credential.expires_at).num_seconds().abs() <= 1);
}

#[tokio::test]
async fn test_ensure_valid_skips_network_when_cached_token_is_valid() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    seed_cache(&dir.path().join("token.json"), "cached_token", chrono::Duration::hours(1));
    mount_token(&server, "unused", 0).await;

    let mut session = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    session.ensure_valid().await.unwrap();
    session.ensure_valid().await.unwrap();

    assert_eq!(session.token(), Some("cached_token"));
}

#[tokio::test]
async fn test_ensure_valid_renews_once_when_expired() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    seed_cache(&dir.path().join("token.json"), "stale_token", -chrono::Duration::minutes(1));
    mount_token(&server, "renewed_token", 1).await;

    let mut session = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    assert!(session.credential().is_none());

    session.ensure_valid().await.unwrap();
    session.ensure_valid().await.unwrap();

    assert_eq!(session.token(), Some("renewed_token"));
}

#[tokio::test]
async fn test_ensure_valid_renews_when_unset() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "first_token", 1).await;

    let mut session = SessionManager::new(config(&server, &dir, Environment::Production)).unwrap();
    session.ensure_valid().await.unwrap();

    assert!(session.is_valid());
}

#[tokio::test]
async fn test_renew_failure_clears_credential() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    seed_cache(&dir.path().join("token.json"), "cached_token", chrono::Duration::hours(1));
    mount_token_failure(&server).await;

    let mut session = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    assert!(session.is_valid());

    let err = session.renew().await.unwrap_err();
    assert!(err.is_renewal());
    assert!(matches!(err, ApiError::Renewal(ref cause) if matches!(**cause, ApiError::ServerError(_))));
    assert!(session.credential().is_none());

    // Failing again from the unset state leaves it unset
    assert!(session.renew().await.is_err());
    assert!(session.credential().is_none());
}

#[tokio::test]
async fn test_renew_rejects_malformed_token_body() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&server)
        .await;

    let mut session = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    let err = session.renew().await.unwrap_err();

    assert!(matches!(err, ApiError::Renewal(ref cause) if matches!(**cause, ApiError::InvalidResponse(_))));
    assert!(session.credential().is_none());
}

#[tokio::test]
async fn test_renew_rejects_out_of_range_expires_in() {
    for expires_in in [json!(10_000_000_000_000_i64), json!(i64::MAX)] {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        seed_cache(&dir.path().join("token.json"), "cached_token", chrono::Duration::hours(1));
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "t",
                "expires_in": expires_in
            })))
            .mount(&server)
            .await;

        let mut session = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
        let err = session.renew().await.unwrap_err();

        assert!(matches!(err, ApiError::Renewal(ref cause) if matches!(**cause, ApiError::InvalidResponse(_))));
        assert!(session.credential().is_none());
    }
}

#[tokio::test]
async fn test_renewed_token_survives_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "persisted_token", 1).await;

    let mut first = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    first.ensure_valid().await.unwrap();
    let issued = first.credential().unwrap().clone();
    drop(first);

    let mut second = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    second.ensure_valid().await.unwrap();

    let loaded = second.credential().unwrap();
    assert_eq!(loaded.token, issued.token);
    assert!((loaded.expires_at - issued.expires_at).num_seconds().abs() <= 1);
}

#[tokio::test]
async fn test_unwritable_cache_does_not_fail_renewal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    // A directory where the cache file should be makes the write fail
    let blocked = dir.path().join("token.json");
    std::fs::create_dir_all(&blocked).unwrap();
    mount_token(&server, "memory_only", 1).await;

    let mut session = SessionManager::new(config(&server, &dir, Environment::Practice)).unwrap();
    session.renew().await.unwrap();

    assert_eq!(session.token(), Some("memory_only"));
}

// ============================================================================
// Condition Search Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_screen_returns_codes_in_order() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "search_token", 1).await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("user_id", "test_user"))
        .and(query_param("seq", "0"))
        .and(header("authorization", "Bearer search_token"))
        .and(header("appkey", "test_key"))
        .and(header("appsecret", "test_secret"))
        .and(header("custtype", "P"))
        .and(header("tr_id", Environment::Practice.screen_tr_id()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rt_cd": "0",
            "msg_cd": "MCA00000",
            "msg1": "정상처리 되었습니다.",
            "output2": [{"code": "005930"}, {"code": "000660"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Practice)).unwrap();
    let result = client.fetch_screen("0").await.unwrap();

    assert_eq!(result, ["005930", "000660"]);
}

#[tokio::test]
async fn test_fetch_screen_business_error_is_empty() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "tok", 1).await;
    mount_search(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"rt_cd": "1", "msg1": "no such condition"})),
        2,
    )
    .await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Practice)).unwrap();
    let result = client.fetch_screen("7").await.unwrap();
    assert!(result.is_empty());

    let err = client.try_fetch_screen("7").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::BusinessStatus { ref code, ref message } if code == "1" && message == "no such condition"
    ));
}

#[tokio::test]
async fn test_fetch_screen_timeout_is_empty() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "tok", 1).await;
    mount_search(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"rt_cd": "0", "output2": [{"code": "005930"}]}))
            .set_delay(Duration::from_secs(2)),
        2,
    )
    .await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Practice)).unwrap();
    let result = client.fetch_screen("0").await.unwrap();
    assert!(result.is_empty());

    let err = client.try_fetch_screen("0").await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_fetch_screen_http_error_is_empty() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "tok", 1).await;
    mount_search(&server, ResponseTemplate::new(500).set_body_string("boom"), 1).await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Practice)).unwrap();
    assert!(client.fetch_screen("0").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_screen_malformed_body_is_empty() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server, "tok", 1).await;
    mount_search(&server, ResponseTemplate::new(200).set_body_string("not json"), 1).await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Practice)).unwrap();
    assert!(client.fetch_screen("0").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_screen_propagates_renewal_failure() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token_failure(&server).await;
    mount_search(&server, ResponseTemplate::new(200), 0).await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Practice)).unwrap();
    let err = client.fetch_screen("0").await.unwrap_err();

    assert!(err.is_renewal());
    assert!(client.session().credential().is_none());
}

#[tokio::test]
async fn test_fetch_screen_renews_expired_token_first() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    seed_cache(&dir.path().join("token.json"), "expired_token", -chrono::Duration::seconds(5));
    mount_token(&server, "renewed_token", 1).await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(header("authorization", "Bearer renewed_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rt_cd": "0", "output2": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Practice)).unwrap();
    let result = client.fetch_screen("0").await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_production_uses_its_own_tr_id() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    seed_cache(&dir.path().join("token.json"), "tok", chrono::Duration::hours(1));

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(header("tr_id", Environment::Production.screen_tr_id()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rt_cd": "0",
            "output2": [{"code": "035420"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = KisClient::new(config(&server, &dir, Environment::Production)).unwrap();
    let result = client.fetch_screen("3").await.unwrap();

    assert_eq!(result, ["035420"]);
    assert_ne!(
        Environment::Production.screen_tr_id(),
        Environment::Practice.screen_tr_id()
    );
}
