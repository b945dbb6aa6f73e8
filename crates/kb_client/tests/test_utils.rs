//! Shared helpers for the wiremock-backed integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kb_client::store::{CredentialStore, MemoryStore};
use kb_client::{ApiClient, ClientConfig, CredentialPair, HttpTransport};
use serde_json::{json, Value};
use wiremock::MockServer;

pub fn envelope(data: Value) -> Value {
    json!({
        "success": true,
        "code": 200,
        "data": data,
        "timestamp": "2025-09-21T10:00:00"
    })
}

pub fn rejection(code: i32, message: &str) -> Value {
    json!({
        "success": false,
        "code": code,
        "data": message,
        "timestamp": "2025-09-21T10:00:00"
    })
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: format!("{}/api", server.uri()),
        request_timeout_secs: 5,
        ..ClientConfig::default()
    }
}

pub fn client_with_store(server: &MockServer, store: Arc<dyn CredentialStore>) -> ApiClient {
    let config = config_for(server);
    let transport = Arc::new(HttpTransport::new(&config).expect("transport"));
    ApiClient::with_parts(config, transport, store)
}

pub fn client_for(server: &MockServer) -> (ApiClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (client_with_store(server, store.clone()), store)
}

pub fn seed_session(client: &ApiClient, access: &str, refresh: &str) {
    client
        .session()
        .save_session(
            &CredentialPair::new(access, Some(refresh.to_string())),
            Some(&kb_client::models::UserProfile {
                id: Some(1),
                username: "alice".to_string(),
                ..Default::default()
            }),
        )
        .expect("seed session");
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
