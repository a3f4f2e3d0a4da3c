
use std::sync::Arc;
use std::time::Duration;

use gateway::error::GENERIC_MESSAGE;
use gateway::types::{
    AttendanceFilters, AttendanceSubmission, AuditFilters, Coordinates, Credentials,
};
use gateway::{ApiClient, ApiConfig, AttendanceApi, ClientError};
use session::store::MemoryStore;
use session::{Role, SessionStore};
use tracing_test::traced_test;

fn client_for(base_url: String) -> (ApiClient, SessionStore) {
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let client = ApiClient::new(&ApiConfig::new(base_url), store.clone()).unwrap();
    (client, store)
}

async fn logged_in(stub: &stub_backend::Stub) -> (ApiClient, SessionStore) {
    let (client, store) = client_for(stub.base_url());
    client
        .auth()
        .login(&Credentials::enrollment("ET20BTCS001", "Secret1"))
        .await
        .unwrap();
    (client, store)
}

fn submission(session_id: &str) -> AttendanceSubmission {
    AttendanceSubmission::new(
        session_id,
        "c1",
        "sch1",
        Coordinates::new(12.9716, 77.5946).unwrap(),
        true,
        vec![],
    )
}

#[tokio::test]
async fn login_establishes_student_session() {
    let stub = stub_backend::spawn().await;
    let (client, store) = client_for(stub.base_url());

    let session = client
        .auth()
        .login(&Credentials::enrollment("ET20BTCS001", "Secret1"))
        .await
        .unwrap();

    assert_eq!(session.token, "abc");
    assert_eq!(session.user.id, "u1");
    assert_eq!(session.role, Role::Student);

    assert_eq!(store.token().await.as_deref(), Some("abc"));
    assert_eq!(store.role().await, Some(Role::Student));

    assert!(!client.guard().authorize(&[Role::Teacher]).await);
    assert!(client.guard().authorize(&[Role::Student]).await);
}

#[tokio::test]
async fn bad_credentials_surface_server_message_without_touching_session() {
    let stub = stub_backend::spawn().await;
    let (client, store) = client_for(stub.base_url());

    let err = client
        .auth()
        .login(&Credentials::enrollment("ET20BTCS001", "wrong"))
        .await
        .unwrap_err();

    match err {
        ClientError::Api { message, status } => {
            assert_eq!(message, "Invalid credentials");
            assert_eq!(status, 401);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn wrong_password_on_relogin_keeps_existing_session() {
    let stub = stub_backend::spawn().await;
    let (client, store) = logged_in(&stub).await;

    let err = client
        .auth()
        .login(&Credentials::enrollment("ET20BTCS001", "wrong"))
        .await
        .unwrap_err();

    match err {
        ClientError::Api { message, status } => {
            assert_eq!(message, "Invalid credentials");
            assert_eq!(status, 401);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stub.last_auth_header(), None);

    let session = store.load().await.expect("session survives a failed login");
    assert_eq!(session.token, "abc");
    assert_eq!(store.role().await, Some(Role::Student));
}

#[tokio::test]
async fn login_response_without_token_is_rejected() {
    let stub = stub_backend::spawn().await;
    let (client, store) = client_for(stub.base_url());

    let err = client
        .auth()
        .login(&Credentials::email("broken@example.edu", "Secret1"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid response from server");
    assert!(store.token().await.is_none());
}

#[tokio::test]
async fn bearer_token_is_attached_after_login() {
    let stub = stub_backend::spawn().await;
    let (client, _) = logged_in(&stub).await;

    let validation = client.validate_qr("good-token").await.unwrap();
    assert!(validation.valid);
    assert_eq!(validation.session_id.as_deref(), Some("s1"));
    assert_eq!(stub.last_auth_header().as_deref(), Some("Bearer abc"));

    let invalid = client.validate_qr("stale").await.unwrap();
    assert!(!invalid.valid);
    assert!(invalid.class_id.is_none());
}

#[tokio::test]
#[traced_test]
async fn rejected_token_clears_session_and_reports_expiry() {
    let stub = stub_backend::spawn().await;
    let (client, store) = logged_in(&stub).await;

    stub.revoke_all_tokens();

    let err = client.validate_qr("good-token").await.unwrap_err();
    assert!(matches!(err, ClientError::SessionExpired));
    assert!(err.requires_login());

    assert!(store.token().await.is_none());
    assert!(store.role().await.is_none());
    assert!(store.load().await.is_none());
    assert!(logs_contain("backend rejected the session token"));
}

#[tokio::test]
async fn role_guard_blocks_before_any_request() {
    let stub = stub_backend::spawn().await;
    let (client, _) = logged_in(&stub).await;
    let before = stub.request_count();

    let err = client.audit().logs(&AuditFilters::default()).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Unauthorized {
            actual: Some(Role::Student),
            ..
        }
    ));
    assert_eq!(stub.request_count(), before);
}

#[tokio::test]
async fn unauthenticated_calls_are_blocked_locally() {
    let stub = stub_backend::spawn().await;
    let (client, _) = client_for(stub.base_url());

    let err = client.validate_qr("good-token").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { actual: None, .. }));
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn error_message_fallbacks() {
    let stub = stub_backend::spawn().await;
    let (client, _) = logged_in(&stub).await;

    let server = client.classes().by_id("broken").await.unwrap_err();
    assert_eq!(server.to_string(), "class store unavailable");
    assert_eq!(server.status(), Some(500));

    let transport = client.classes().all().await.unwrap_err();
    assert_eq!(
        transport.to_string(),
        "Request failed with status code 404 (Not Found)"
    );

    let generic = client.classes().by_id("c1").await.unwrap_err();
    assert_eq!(generic.to_string(), GENERIC_MESSAGE);
    assert_eq!(generic.status(), Some(599));
}

#[tokio::test]
async fn submit_returns_recorded_attendance() {
    let stub = stub_backend::spawn().await;
    let (client, _) = logged_in(&stub).await;

    let record = client.submit_attendance(&submission("s1")).await.unwrap();
    assert_eq!(record.id, "att-1");
    assert!(record.liveness_passed);

    let sent = stub.seen.bodies.lock().last().cloned().unwrap();
    assert_eq!(sent["sessionId"], "s1");
    assert_eq!(sent["studentCoordinates"]["latitude"], 12.9716);
}

#[tokio::test]
async fn sync_reports_per_item_outcome() {
    let stub = stub_backend::spawn().await;
    let (client, _) = logged_in(&stub).await;

    let batch = vec![submission("s1"), submission("dup")];
    let result = client.sync_attendance(&batch).await.unwrap();

    assert_eq!(result.success, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.details.len(), 2);
    assert_eq!(result.details[1].data.session_id(), "dup");
}

#[tokio::test]
async fn slow_backend_times_out() {
    let stub = stub_backend::spawn().await;
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let config = ApiConfig::new(stub.base_url()).with_request_timeout(Duration::from_millis(300));
    let client = ApiClient::new(&config, store).unwrap();
    client
        .auth()
        .login(&Credentials::enrollment("ET20BTCS001", "Secret1"))
        .await
        .unwrap();

    let err = client
        .attendance()
        .by_class("slow", &AttendanceFilters::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Timeout));
    assert!(err.is_network());
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let (client, _) = client_for("http://127.0.0.1:1/api".to_string());

    let err = client
        .auth()
        .login(&Credentials::enrollment("ET20BTCS001", "Secret1"))
        .await
        .unwrap_err();

    assert!(err.is_network(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn blank_ids_never_reach_the_backend() {
    let stub = stub_backend::spawn().await;
    let (client, _) = logged_in(&stub).await;
    let before = stub.request_count();

    let class = client.classes().by_id("  ").await.unwrap_err();
    assert!(matches!(class, ClientError::Validation(_)));

    let schedules = client.schedules().by_class("").await.unwrap_err();
    assert!(matches!(schedules, ClientError::Validation(_)));

    let nested = client.classes().by_id("c1/students").await.unwrap_err();
    assert!(matches!(nested, ClientError::Validation(_)));

    assert_eq!(stub.request_count(), before);
}
