//! Backend client contract tests: paths, bodies and status mapping.

use devochat::api::{BackendClient, NewConversationRequest};
use devochat::config::BackendConfig;
use devochat::error::{ClientError, ErrorKind};
use devochat::observability::redact::RedactedString;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BackendClient {
    let config = BackendConfig {
        base_url: format!("{}/", server.uri()),
        ..BackendConfig::default()
    };
    match BackendClient::new(&config) {
        Ok(c) => c,
        Err(e) => unreachable!("client: {e}"),
    }
}

fn ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"message": "ok"}))
}

#[tokio::test]
async fn conversations_parse_mixed_timestamps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversations": [
                {"conversation_id": "a", "alias": "First", "created_at": "2024-05-01T10:00:00Z"},
                {"conversation_id": "b", "alias": "Second", "starred": true,
                 "starred_at": "2024-05-02T08:30:00.123456", "created_at": null}
            ]
        })))
        .mount(&server)
        .await;

    let list = match client(&server).conversations().await {
        Ok(l) => l,
        Err(e) => unreachable!("conversations: {e}"),
    };
    assert_eq!(list.len(), 2);
    assert!(list[0].created_at.is_some());
    assert!(list[1].starred);
    assert!(list[1].starred_at.is_some());
    assert!(list[1].created_at.is_none());
}

#[tokio::test]
async fn new_conversation_posts_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new_conversation"))
        .and(body_partial_json(json!({
            "model": "m1",
            "user_message": "hello",
            "system_message": ""
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation_id": "c9",
            "alias": "",
            "created_at": "2024-05-01T10:00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = NewConversationRequest {
        model: "m1",
        temperature: 0.5,
        reason: 0.5,
        system_message: "",
        user_message: "hello",
    };
    let created = match client(&server).new_conversation(&request).await {
        Ok(c) => c,
        Err(e) => unreachable!("new_conversation: {e}"),
    };
    assert_eq!(created.conversation_id, "c9");
    assert!(created.created_at.is_some());
}

#[tokio::test]
async fn conversation_mutations_hit_their_paths() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/conversation/c1/rename"))
        .and(body_json(json!({"alias": "Renamed"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/conversation/c1/star"))
        .and(body_json(json!({"starred": true})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/conversation/c1/3"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/conversation/c1"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/conversation/all"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.rename_conversation("c1", "Renamed").await.is_ok());
    assert!(client.star_conversation("c1", true).await.is_ok());
    assert!(client.delete_messages_from("c1", 3).await.is_ok());
    assert!(client.delete_conversation("c1").await.is_ok());
    assert!(client.delete_all_conversations().await.is_ok());
}

#[tokio::test]
async fn rejected_login_is_a_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"email": "a@b.c", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})))
        .mount(&server)
        .await;

    let result = client(&server)
        .login("a@b.c", &RedactedString::new("wrong"))
        .await;
    match result {
        Err(e) => assert_eq!(e.kind(), ErrorKind::Validation),
        Ok(()) => unreachable!("login should fail"),
    }
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversation/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "not here"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(client.user_info().await, Err(ClientError::AuthExpired(_))));
    match client.conversation("missing").await {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::NotFound);
            assert!(e.message().contains("not here"), "{e}");
        }
        Ok(_) => unreachable!("missing conversation"),
    }
    match client.models().await {
        Err(e) => assert_eq!(e.kind(), ErrorKind::Network),
        Ok(_) => unreachable!("models should fail"),
    }
}

#[tokio::test]
async fn blank_alias_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get_alias"))
        .and(body_json(json!({"conversation_id": "c1", "text": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alias": "  "})))
        .mount(&server)
        .await;

    let alias = client(&server).generate_alias("c1", "hello").await;
    assert!(matches!(alias, Ok(None)), "{alias:?}");
}

#[tokio::test]
async fn realtime_credential_is_redacted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_secret": {"value": "ek_secret"}
        })))
        .mount(&server)
        .await;

    let credential = match client(&server).realtime_credential().await {
        Ok(c) => c,
        Err(e) => unreachable!("credential: {e}"),
    };
    assert_eq!(credential.as_str(), "ek_secret");
    assert!(!format!("{credential:?}").contains("ek_secret"));
}
