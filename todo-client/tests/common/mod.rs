//! Shared fixtures for the client integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use client::{Notice, Notifier, SessionManager, TokenStore};
use serde_json::{Value, json};
use shared::config::ClientConfig;
use tokio::sync::broadcast;
use wiremock::MockServer;

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "longenoughpassword";

pub fn user_json(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "full_name": "A B",
        "is_active": true,
        "created_at": "2024-01-01T00:00:00",
        "updated_at": "2024-01-01T00:00:00"
    })
}

pub fn todo_json(id: &str, title: &str, is_completed: bool) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": null,
        "is_completed": is_completed,
        "created_at": "2024-01-02T10:00:00.123456",
        "updated_at": "2024-01-02T10:00:00.123456"
    })
}

pub fn token_json(token: &str) -> Value {
    json!({ "access_token": token, "token_type": "bearer" })
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::with_defaults();
    config.api_base_url = server.uri().parse().expect("mock server uri");
    config.request_timeout_secs = 1;
    config
}

pub fn start_session(
    server: &MockServer,
    store: Arc<dyn TokenStore>,
) -> (SessionManager, broadcast::Receiver<Notice>) {
    let notifier = Notifier::new();
    let notices = notifier.subscribe();
    let session = SessionManager::start(&config_for(server), store, notifier).expect("session");
    (session, notices)
}

/// Every notice received so far.
pub fn drain(notices: &mut broadcast::Receiver<Notice>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        messages.push(notice.message);
    }
    messages
}

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);
