//! Token lifecycle against a mocked backend: login, logout, reactive and
//! proactive refresh, hard authentication failure.

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use kb_client::store::{CredentialStore, FileStore, ACCESS_TOKEN_KEY, IDENTITY_KEY, REFRESH_TOKEN_KEY};
use kb_client::{ApiOutcome, ClientError, CredentialPair};
use serde_json::json;
use test_utils::{client_for, client_with_store, envelope, eventually, rejection, seed_session};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page_of_documents() -> serde_json::Value {
    envelope(json!({
        "data": [{"id": "doc-1", "title": "Getting started"}],
        "page": 0,
        "size": 10,
        "total": 1,
        "totalPages": 1
    }))
}

async fn mount_refresh(server: &MockServer, delay: Duration, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refreshToken": "R1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(envelope(json!({"token": access, "refreshToken": refresh}))),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_stores_pair_and_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "token": "T1",
            "refreshToken": "R1",
            "user": {"id": 1, "username": "alice", "email": "alice@example.com"}
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    let outcome = client.auth().login("alice", "pw").await.expect("login");

    assert!(outcome.is_success());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("T1"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
    assert!(store.get(IDENTITY_KEY).is_some_and(|v| !v.is_empty()));
    assert_eq!(
        client.auth().local_identity().map(|u| u.username).as_deref(),
        Some("alice")
    );
}

#[tokio::test]
async fn failed_login_keeps_existing_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(rejection(400, "bad credentials")))
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T0", "R0");

    let outcome = client.auth().login("alice", "wrong").await.expect("outcome");
    match outcome {
        ApiOutcome::Rejected(err) => assert_eq!(err.message, "bad credentials"),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(
        client.session().credentials(),
        Some(CredentialPair::new("T0", Some("R0".to_string())))
    );
}

#[tokio::test]
async fn unauthorized_login_does_not_purge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T0", "R0");

    let err = client.auth().login("alice", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 401, .. }));
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn logout_clears_everything_even_when_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    seed_session(&client, "T1", "R1");

    client.auth().logout().await.expect("logout");

    assert!(store.is_empty());
    assert!(client.auth().local_identity().is_none());
}

#[tokio::test]
async fn calls_carry_bearer_and_trace_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .and(header("authorization", "Bearer T1"))
        .and(header_exists("x-trace-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of_documents()))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let page = client
        .documents()
        .list(0, 10, None)
        .await
        .expect("list")
        .into_result()
        .expect("success");
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].title.as_deref(), Some("Getting started"));
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of_documents()))
        .mount(&server)
        .await;
    mount_refresh(&server, Duration::from_millis(200), "T2", "R2").await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.documents().list(0, 10, None).await })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.expect("join").expect("call recovered");
        assert!(outcome.is_success());
    }
    assert_eq!(
        client.session().credentials(),
        Some(CredentialPair::new("T2", Some("R2".to_string())))
    );
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_rejected_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_delay(Duration::from_millis(200))
                .set_body_json(rejection(400, "refresh token revoked")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.documents().list(0, 10, None).await })
        })
        .collect();

    for handle in handles {
        let err = handle.await.expect("join").unwrap_err();
        assert_eq!(err, ClientError::AuthenticationExpired);
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn refresh_finishing_after_logout_stores_nothing() {
    let server = MockServer::start().await;
    mount_refresh(&server, Duration::from_millis(300), "T2", "R2").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(null))))
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let refreshing = {
        let client = client.clone();
        tokio::spawn(async move { client.auth().refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.auth().logout().await.expect("logout");

    let outcome = refreshing.await.expect("join");
    assert_eq!(outcome, Err(ClientError::AuthenticationExpired));
    assert!(store.is_empty());
    assert!(client.auth().local_identity().is_none());
}

#[tokio::test]
async fn refresh_finishing_after_a_new_login_keeps_the_login() {
    let server = MockServer::start().await;
    mount_refresh(&server, Duration::from_millis(300), "T2", "R2").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "token": "T9",
            "refreshToken": "R9",
            "user": {"username": "bob"}
        }))))
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let refreshing = {
        let client = client.clone();
        tokio::spawn(async move { client.auth().refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.auth().login("bob", "pw").await.expect("login");

    assert!(refreshing.await.expect("join").is_err());
    assert_eq!(
        client.session().credentials(),
        Some(CredentialPair::new("T9", Some("R9".to_string())))
    );
    assert_eq!(
        client.auth().local_identity().map(|u| u.username).as_deref(),
        Some("bob")
    );
}

#[tokio::test]
async fn hard_failure_purges_and_reports_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let err = client.documents().list(0, 10, None).await.unwrap_err();

    assert_eq!(err, ClientError::AuthenticationExpired);
    assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY), None);
    assert_eq!(store.get(IDENTITY_KEY), None);
}

#[tokio::test]
async fn soft_hint_refreshes_in_background() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Token-Refresh-Needed", "true")
                .set_body_json(envelope(json!({"status": "UP"}))),
        )
        .mount(&server)
        .await;
    mount_refresh(&server, Duration::from_millis(300), "T2", "R2").await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let outcome = client.system().status().await.expect("status");
    assert_eq!(outcome.data(), Some(&json!({"status": "UP"})));
    // The caller got its answer before the refresh finished.
    assert_eq!(client.session().access_token().as_deref(), Some("T1"));

    let session = client.session().clone();
    assert!(eventually(|| session.access_token().as_deref() == Some("T2")).await);
    assert_eq!(session.refresh_token().as_deref(), Some("R2"));
}

#[tokio::test]
async fn failed_background_refresh_does_not_touch_the_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vector-data/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-token-refresh-needed", "true")
                .set_body_json(envelope(json!({"totalVectors": 42}))),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(400).set_body_json(rejection(400, "expired")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let stats = client
        .vectors()
        .stats()
        .await
        .expect("stats")
        .into_result()
        .expect("success");
    assert_eq!(stats["totalVectors"], 42);

    let session = client.session().clone();
    assert!(eventually(|| session.access_token().is_none()).await);
}

#[tokio::test]
async fn new_access_token_header_replaces_only_the_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversation/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-New-Access-Token", "T1b")
                .set_body_json(json!({"success": true, "data": {"total": 3}})),
        )
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T1", "R1");

    client.conversations().stats().await.expect("stats");

    assert_eq!(
        client.session().credentials(),
        Some(CredentialPair::new("T1b", Some("R1".to_string())))
    );
}

#[tokio::test]
async fn back_to_back_refreshes_store_the_same_pair() {
    let server = MockServer::start().await;
    mount_refresh(&server, Duration::from_millis(100), "T2", "R2").await;

    let (client, _) = client_for(&server);
    seed_session(&client, "T1", "R1");

    let auth = client.auth();
    let (first, second) = tokio::join!(auth.refresh(), auth.refresh());

    let expected = CredentialPair::new("T2", Some("R2".to_string()));
    assert_eq!(first.expect("first"), expected);
    assert_eq!(second.expect("second"), expected);
    assert_eq!(client.session().credentials(), Some(expected));
}

#[tokio::test]
async fn file_backed_session_survives_a_new_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "token": "T1",
            "refreshToken": "R1",
            "user": {"username": "alice"}
        }))))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let session_path = dir.path().join("session.json");

    let first = client_with_store(&server, Arc::new(FileStore::new(&session_path)));
    first.auth().login("alice", "pw").await.expect("login");
    drop(first);

    let second = client_with_store(&server, Arc::new(FileStore::new(&session_path)));
    assert_eq!(second.session().access_token().as_deref(), Some("T1"));
    assert_eq!(
        second.auth().local_identity().map(|u| u.username).as_deref(),
        Some("alice")
    );
}
