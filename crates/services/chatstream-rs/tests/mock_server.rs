//! Standalone mock server tests for chatstream_rs.
//!
//! These tests drive the HTTP client and the orchestrator against a wiremock
//! server.

use chatstream_rs::types::{CreateSessionRequest, MessageRole, SessionStatus};
use chatstream_rs::{ChatOrchestrator, ChatStreamError, ClientBuilder, OrchestratorConfig};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true, "data": data }))
}

fn session_json(id: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "status": "ACTIVE",
        "ownerId": "u1",
        "messageCount": 0,
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

/// Test creating a session.
#[tokio::test]
async fn create_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(body_json(serde_json::json!({ "title": "Leave", "userId": "u1" })))
        .respond_with(envelope(session_json("s1", "Leave")))
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    let session = client
        .sessions()
        .create(&CreateSessionRequest {
            title: Some("Leave".into()),
            user_id: Some("u1".into()),
        })
        .await
        .unwrap();

    assert_eq!(session.id, "s1");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.owner_id.as_deref(), Some("u1"));
}

/// Test listing sessions filtered by owner.
#[tokio::test]
async fn list_sessions_by_owner() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(query_param("userId", "u1"))
        .respond_with(envelope(serde_json::json!([
            session_json("s1", "one"),
            session_json("s2", "two")
        ])))
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    let sessions = client.sessions().list(Some("u1")).await.unwrap();

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].title, "two");
}

/// Test reading a session with its messages.
#[tokio::test]
async fn session_with_messages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions/s1/full"))
        .respond_with(envelope(serde_json::json!({
            "session": session_json("s1", "one"),
            "messages": [{
                "id": "m1",
                "sessionId": "s1",
                "role": "USER",
                "content": "hello",
                "timestamp": "2024-05-01T10:00:00Z"
            }]
        })))
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    let full = client.sessions().get_with_messages("s1").await.unwrap();

    assert_eq!(full.session.id, "s1");
    assert_eq!(full.messages[0].role, MessageRole::User);
}

/// Test 404 error handling with an error envelope.
#[tokio::test]
async fn session_not_found_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions/nonexistent"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "success": false,
            "errorCode": "SESSION_NOT_FOUND",
            "errorMessage": "Session not found"
        })))
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    let result = client.sessions().get("nonexistent").await;

    match result {
        Err(ChatStreamError::Http {
            status,
            error_code,
            message,
        }) => {
            assert_eq!(status, 404);
            assert_eq!(error_code.as_deref(), Some("SESSION_NOT_FOUND"));
            assert_eq!(message, "Session not found");
        }
        other => panic!("Expected Http NotFound error, got {other:?}"),
    }
}

/// Test deleting a session.
#[tokio::test]
async fn delete_session() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    client.sessions().delete("s1").await.unwrap();
}

/// Test listing quick prompts.
#[tokio::test]
async fn quick_prompts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quick-prompts"))
        .respond_with(envelope(serde_json::json!([
            { "id": "q1", "title": "Leave", "content": "How many leave days do I have?", "category": "HR" }
        ])))
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    let prompts = client.prompts().list().await.unwrap();

    assert_eq!(prompts[0].category.as_deref(), Some("HR"));
}

/// Test a full turn: session creation, streaming, accumulation.
#[tokio::test]
async fn orchestrated_turn_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(envelope(session_json("s1", "Hi")))
        .expect(1)
        .mount(&server)
        .await;

    let body = concat!(
        "event: status\n",
        "data: {\"status\":\"thinking\"}\n\n",
        "event: message\n",
        "data: {\"contentType\":\"user\",\"content\":\"Hi\",\"sessionId\":\"s1\",\"messageId\":\"m-user\"}\n\n",
        "event: message\n",
        "data: {\"contentType\":\"assistant\",\"content\":\"Hel\"}\n\n",
        "event: message\n",
        "data: {\"contentType\":\"assistant\",\"content\":\"lo\"}\n\n",
        "event: completed\n",
        "data: {\"sessionId\":\"s1\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/stream"))
        .and(query_param("sessionId", "s1"))
        .and(query_param("message", "Hi"))
        .and(query_param("userId", "u1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    let chat = ChatOrchestrator::new(client, OrchestratorConfig::default().with_user_id("u1"));

    let outcome = chat.handle_send_message("Hi").await;
    assert!(outcome.is_completed(), "unexpected outcome {outcome:?}");

    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "m-user");
    assert_eq!(messages[1].content, "Hello");
    assert!(!chat.is_streaming());
}

/// Test that a rejected stream leaves the conversation untouched.
#[tokio::test]
async fn stream_rejected_by_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(envelope(session_json("s1", "Hi")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
    let chat = ChatOrchestrator::new(client, OrchestratorConfig::default());

    match chat.handle_send_message("Hi").await {
        chatstream_rs::SendOutcome::StreamOpenFailed(err) => assert!(err.is_server_error()),
        other => panic!("unexpected {other:?}"),
    }
    assert!(chat.messages().is_empty());
}
