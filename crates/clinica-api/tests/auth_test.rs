#![allow(clippy::unwrap_used)]
// Login sub-protocol tests using wiremock.

use std::sync::Arc;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clinica_api::{ApiClient, Durability, Error, MemoryStore, Principal, SessionStore, Sleeper};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient, Arc<MemoryStore>, Arc<MemoryStore>) {
    let server = MockServer::start().await;
    let durable = Arc::new(MemoryStore::new());
    let ephemeral = Arc::new(MemoryStore::new());
    let session = Arc::new(SessionStore::new(durable.clone(), ephemeral.clone()));
    let client =
        ApiClient::with_client(reqwest::Client::new(), &Url::parse(&server.uri()).unwrap())
            .with_session(session)
            .with_sleeper(Sleeper::instant());
    (server, client, durable, ephemeral)
}

fn password() -> secrecy::SecretString {
    "s3cret".to_string().into()
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_stores_persistent_session() {
    let (server, client, durable, ephemeral) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_partial_json(json!({
            "username": "ana@clinica.do",
            "email": "ana@clinica.do",
            "password": "s3cret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt-1",
            "usuario": { "_id": "u1", "nombre": "Ana", "sucursal": "s1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client
        .login("ana@clinica.do", &password(), Durability::Persistent)
        .await
        .unwrap();

    assert_eq!(outcome.token, "jwt-1");
    assert_eq!(
        outcome.principal.as_ref().and_then(Principal::branch_id).as_deref(),
        Some("s1")
    );
    assert_eq!(client.session().token().as_deref(), Some("jwt-1"));
    assert!(!durable.is_empty());
    assert!(ephemeral.is_empty());
}

#[tokio::test]
async fn test_login_ephemeral_reads_nested_envelope() {
    let (server, client, durable, ephemeral) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "access_token": "jwt-2", "user": { "id": 2, "name": "Luis" } }
        })))
        .mount(&server)
        .await;

    let outcome = client
        .login("luis", &password(), Durability::Ephemeral)
        .await
        .unwrap();

    assert_eq!(outcome.token, "jwt-2");
    assert_eq!(
        client.session().principal().unwrap().display_name(),
        Some("Luis")
    );
    assert!(durable.is_empty());
    assert!(!ephemeral.is_empty());
}

#[tokio::test]
async fn test_login_does_not_send_stale_token() {
    let (server, client, _, _) = setup().await;
    client
        .session()
        .set_session(&Principal::new(json!({ "id": 0 })), "stale", Durability::Persistent)
        .unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "fresh" })))
        .mount(&server)
        .await;

    client
        .login("ana", &password(), Durability::Persistent)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
    assert_eq!(client.session().token().as_deref(), Some("fresh"));
    // No principal in the reply means none is stored.
    assert!(client.session().principal().is_none());
}

#[tokio::test]
async fn test_login_without_token_is_missing_token() {
    let (server, client, durable, ephemeral) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "undefined",
            "usuario": { "id": 1 }
        })))
        .mount(&server)
        .await;

    let result = client.login("ana", &password(), Durability::Persistent).await;

    assert!(
        matches!(result, Err(Error::MissingToken)),
        "expected MissingToken, got: {result:?}"
    );
    assert!(durable.is_empty());
    assert!(ephemeral.is_empty());
}

#[tokio::test]
async fn test_login_with_unreadable_body_is_missing_token() {
    let (server, client, durable, ephemeral) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy page</html>"))
        .mount(&server)
        .await;

    let result = client.login("ana", &password(), Durability::Persistent).await;

    assert!(
        matches!(result, Err(Error::MissingToken)),
        "expected MissingToken, got: {result:?}"
    );
    assert!(client.is_connected());
    assert!(durable.is_empty());
    assert!(ephemeral.is_empty());
}

#[tokio::test]
async fn test_login_rejected_keeps_existing_session() {
    let (server, client, _, _) = setup().await;
    client
        .session()
        .set_session(&Principal::new(json!({ "id": 0 })), "current", Durability::Persistent)
        .unwrap();
    let mut invalidated = client.subscribe_session();

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "mensaje": "Credenciales inválidas" })),
        )
        .mount(&server)
        .await;

    let result = client.login("ana", &password(), Durability::Persistent).await;

    match result {
        Err(Error::LoginRejected { status, ref message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Credenciales inválidas");
        }
        other => panic!("expected LoginRejected, got: {other:?}"),
    }
    assert_eq!(client.session().token().as_deref(), Some("current"));
    assert!(invalidated.try_recv().is_err());
}

#[tokio::test]
async fn test_login_gateway_error_is_not_retried() {
    let (server, client, _, _) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client
        .login("ana", &password(), Durability::Persistent)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Gateway { status: 503, .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(!client.is_connected());
}

// ── Session endpoints ───────────────────────────────────────────────

#[tokio::test]
async fn test_me_unwraps_user_envelope() {
    let (server, client, _, _) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "usuario": { "_id": "u1", "nombre": "Ana" }
        })))
        .mount(&server)
        .await;

    let me = client.me().await.unwrap();
    assert_eq!(me.display_name(), Some("Ana"));
}

#[tokio::test]
async fn test_logout_clears_both_scopes() {
    let (_server, client, durable, ephemeral) = setup().await;
    client
        .session()
        .set_session(&Principal::new(json!({ "id": 1 })), "t", Durability::Ephemeral)
        .unwrap();

    client.logout().unwrap();
    client.logout().unwrap();

    assert!(durable.is_empty());
    assert!(ephemeral.is_empty());
}
