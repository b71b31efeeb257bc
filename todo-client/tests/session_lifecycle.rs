//! Session state machine against a stub API server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use client::auth_form::AuthForm;
use client::notifications::{AUTHENTICATED, SESSION_EXPIRED};
use client::{
    FileTokenStore, MemoryTokenStore, SessionError, SessionStatus, TodoBoard, TokenStore,
};
use common::{EMAIL, PASSWORD, SETTLE_TIMEOUT, drain, start_session, token_json, user_json};
use serde_json::json;
use shared::models::{LoginRequest, RegisterRequest};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> LoginRequest {
    LoginRequest {
        email: EMAIL.to_string(),
        password: PASSWORD.to_string(),
    }
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("username=a%40b.com"))
        .and(body_string_contains("password=longenoughpassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json(token)))
        .mount(server)
        .await;
}

async fn mount_me(server: &MockServer, token: &str, id: &str, email: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, email)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_authenticates_and_persists_token() {
    let server = MockServer::start().await;
    mount_login(&server, "tok1").await;
    mount_me(&server, "tok1", "1", EMAIL).await;

    let store = Arc::new(MemoryTokenStore::new());
    let (session, _notices) = start_session(&server, store.clone());
    assert_eq!(session.status(), SessionStatus::Unauthenticated);

    let outcome = session.login(&credentials()).await.unwrap();
    assert_eq!(outcome.status(), SessionStatus::Authenticated);
    assert_eq!(outcome.user().unwrap().email, EMAIL);
    assert_eq!(outcome.user().unwrap().id, "1");
    assert_eq!(store.get().as_deref(), Some("tok1"));
}

#[tokio::test]
async fn stale_bootstrap_never_overwrites_newer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(user_json("1", "old@b.com"))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    mount_me(&server, "tok2", "2", "new@b.com").await;

    let (session, _notices) = start_session(&server, Arc::new(MemoryTokenStore::with_token("tok1")));
    let stale = tokio::spawn({
        let session = session.clone();
        async move { session.bootstrap().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fresh = session.adopt_token(Some("tok2".into())).await;
    assert_eq!(fresh.user().unwrap().email, "new@b.com");

    stale.await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let current = session.snapshot();
    assert_eq!(current.status(), SessionStatus::Authenticated);
    assert_eq!(current.token(), Some("tok2"));
    assert_eq!(current.user().unwrap().id, "2");
}

#[tokio::test]
async fn logout_twice_matches_logout_once() {
    let server = MockServer::start().await;
    mount_me(&server, "tok1", "1", EMAIL).await;

    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let (session, _notices) = start_session(&server, store.clone());
    assert!(session.bootstrap().await.is_authenticated());

    assert!(session.logout());
    let once = session.snapshot();
    assert!(!session.logout());
    assert_eq!(session.snapshot(), once);
    assert_eq!(once.status(), SessionStatus::Unauthenticated);
    assert!(once.user().is_none());
    assert_eq!(store.get(), None);
}

#[tokio::test]
async fn unauthorized_response_signs_out_authenticated_session() {
    let server = MockServer::start().await;
    mount_me(&server, "tok1", "1", EMAIL).await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let (session, mut notices) = start_session(&server, store.clone());
    assert!(session.bootstrap().await.is_authenticated());

    let mut board = TodoBoard::for_session(&session);
    let err = board.refresh().await.unwrap_err();
    assert!(matches!(err, client::TodoError::Api(ref api) if api.is_unauthorized()));

    let mut updates = session.subscribe();
    tokio::time::timeout(
        SETTLE_TIMEOUT,
        updates.wait_for(|current| current.status() == SessionStatus::Unauthenticated),
    )
    .await
    .expect("session signs out")
    .expect("session channel open");

    let current = session.snapshot();
    assert!(current.user().is_none());
    assert_eq!(current.token(), None);
    assert_eq!(store.get(), None);
    assert!(drain(&mut notices).contains(&SESSION_EXPIRED.to_string()));
}

#[tokio::test]
async fn registration_chains_into_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(user_json("1", EMAIL)))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "tok1").await;
    mount_me(&server, "tok1", "1", EMAIL).await;

    let (session, _notices) = start_session(&server, Arc::new(MemoryTokenStore::new()));
    let request = RegisterRequest {
        email: EMAIL.to_string(),
        full_name: "A B".to_string(),
        password: PASSWORD.to_string(),
    };
    let outcome = session.register(&request).await.unwrap();
    assert!(outcome.is_authenticated());
    assert_eq!(outcome.user().unwrap().full_name, "A B");
}

#[tokio::test]
async fn registration_alone_does_not_authenticate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(user_json("1", EMAIL)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect email or password"})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let (session, _notices) = start_session(&server, store.clone());
    let request = RegisterRequest {
        email: EMAIL.to_string(),
        full_name: "A B".to_string(),
        password: PASSWORD.to_string(),
    };
    let err = session.register(&request).await.unwrap_err();
    assert!(matches!(err, SessionError::Api(ref api) if api.is_unauthorized()));
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(store.get(), None);
}

#[tokio::test]
async fn failed_registration_skips_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Email already registered"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("tok1")))
        .expect(0)
        .mount(&server)
        .await;

    let (session, _notices) = start_session(&server, Arc::new(MemoryTokenStore::new()));
    let request = RegisterRequest {
        email: EMAIL.to_string(),
        full_name: "A B".to_string(),
        password: PASSWORD.to_string(),
    };
    let err = session.register(&request).await.unwrap_err();
    match err {
        SessionError::Api(api) => assert_eq!(api.detail(), Some("Email already registered")),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn persisted_token_survives_restart() {
    let server = MockServer::start().await;
    mount_login(&server, "tok1").await;
    mount_me(&server, "tok1", "1", EMAIL).await;
    let dir = TempDir::new().unwrap();

    let before = {
        let (session, _notices) = start_session(&server, Arc::new(FileTokenStore::new(dir.path())));
        let outcome = session.login(&credentials()).await.unwrap();
        session.shutdown();
        outcome.user().cloned().unwrap()
    };

    let (restarted, _notices) = start_session(&server, Arc::new(FileTokenStore::new(dir.path())));
    assert_eq!(restarted.status(), SessionStatus::Loading);
    let after = restarted.bootstrap().await;
    assert!(after.is_authenticated());
    assert_eq!(after.user(), Some(&before));
}

#[tokio::test]
async fn persisted_token_rejected_on_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("expired"));
    let (session, mut notices) = start_session(&server, store.clone());
    assert_eq!(session.status(), SessionStatus::Loading);

    let outcome = session.bootstrap().await;
    assert_eq!(outcome.status(), SessionStatus::Unauthenticated);
    assert!(outcome.user().is_none());
    assert_eq!(store.get(), None);
    assert_eq!(drain(&mut notices), vec![SESSION_EXPIRED.to_string()]);
}

#[tokio::test]
async fn persisted_token_resolves_without_explicit_bootstrap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("1", EMAIL)))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _notices) = start_session(&server, Arc::new(MemoryTokenStore::with_token("tok1")));
    let mut updates = session.subscribe();
    tokio::time::timeout(
        SETTLE_TIMEOUT,
        updates.wait_for(|current| current.status() == SessionStatus::Authenticated),
    )
    .await
    .expect("startup bootstrap completes")
    .expect("session channel open");

    // Joins the finished startup fetch instead of issuing another.
    let joined = session.bootstrap().await;
    assert_eq!(joined.user().unwrap().id, "1");
}

#[tokio::test]
async fn failed_login_before_bootstrap_never_leaves_loading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect email or password"})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("stale"));
    let (session, mut notices) = start_session(&server, store.clone());
    assert!(session.login(&credentials()).await.is_err());

    let mut updates = session.subscribe();
    tokio::time::timeout(
        SETTLE_TIMEOUT,
        updates.wait_for(|current| current.status() != SessionStatus::Loading),
    )
    .await
    .expect("session settles")
    .expect("session channel open");

    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(store.get(), None);
    assert_eq!(drain(&mut notices), vec![SESSION_EXPIRED.to_string()]);
}

#[tokio::test]
async fn bootstrap_network_failure_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let (session, mut notices) = start_session(&server, store.clone());
    let outcome = session.bootstrap().await;
    assert_eq!(outcome.status(), SessionStatus::Unauthenticated);
    assert_eq!(store.get(), None);
    assert_eq!(drain(&mut notices), vec![SESSION_EXPIRED.to_string()]);
}

#[tokio::test]
async fn failed_login_keeps_existing_session() {
    let server = MockServer::start().await;
    mount_me(&server, "tok1", "1", EMAIL).await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect email or password"})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let (session, _notices) = start_session(&server, store.clone());
    let before = session.bootstrap().await;
    assert!(before.is_authenticated());

    assert!(session.login(&credentials()).await.is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.snapshot(), before);
    assert_eq!(store.get().as_deref(), Some("tok1"));
}

#[tokio::test]
async fn failed_login_never_leaves_loading() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (session, _notices) = start_session(&server, Arc::new(MemoryTokenStore::new()));
    let err = session.login(&credentials()).await.unwrap_err();
    assert!(matches!(err, SessionError::Api(ref api) if api.status().map(|s| s.as_u16()) == Some(500)));
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn invalid_credentials_are_never_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("tok1")))
        .expect(0)
        .mount(&server)
        .await;

    let (session, _notices) = start_session(&server, Arc::new(MemoryTokenStore::new()));
    let request = LoginRequest {
        email: "nope".to_string(),
        password: "short".to_string(),
    };
    let err = session.login(&request).await.unwrap_err();
    match err {
        SessionError::Validation(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_login_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_json("tok1"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "tok1", "1", EMAIL).await;

    let (session, _notices) = start_session(&server, Arc::new(MemoryTokenStore::new()));
    let first = tokio::spawn({
        let session = session.clone();
        async move { session.login(&credentials()).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = session.login(&credentials()).await;
    assert!(matches!(second, Err(SessionError::AttemptInProgress)));

    let first = first.await.unwrap().unwrap();
    assert!(first.is_authenticated());
}

#[tokio::test]
async fn rejected_second_submit_raises_no_failure_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_json("tok1"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "tok1", "1", EMAIL).await;

    let (session, mut notices) = start_session(&server, Arc::new(MemoryTokenStore::new()));
    let first = tokio::spawn({
        let session = session.clone();
        async move { AuthForm::login(EMAIL, PASSWORD).submit(&session).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = AuthForm::login(EMAIL, PASSWORD).submit(&session).await;
    assert!(matches!(second, Err(SessionError::AttemptInProgress)));
    assert!(drain(&mut notices).is_empty());

    assert!(first.await.unwrap().unwrap().is_authenticated());
    assert_eq!(drain(&mut notices), vec![AUTHENTICATED.to_string()]);
}

#[tokio::test]
async fn shutdown_abandons_bootstrap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(user_json("1", EMAIL))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let (session, mut notices) = start_session(&server, store.clone());
    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.bootstrap().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.shutdown();

    let outcome = tokio::time::timeout(Duration::from_millis(300), pending)
        .await
        .expect("bootstrap returns promptly")
        .unwrap();
    assert_eq!(outcome.status(), SessionStatus::Loading);
    assert!(outcome.user().is_none());
    assert_eq!(store.get().as_deref(), Some("tok1"));
    assert!(drain(&mut notices).is_empty());
}
