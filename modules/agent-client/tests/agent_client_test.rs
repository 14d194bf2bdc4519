use agent_client::{AgentClient, AgentError, AgentTransport, ConversationContext};
use guided_search_common::Role;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AGENT_ID: &str = "a1b2-c3";

fn client(server: &MockServer) -> AgentClient {
    AgentClient::new(&server.uri(), AGENT_ID, "APP123", "secret-key")
}

#[tokio::test]
async fn send_message_posts_history_as_text_parts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/1/agents/{AGENT_ID}/completions")))
        .and(query_param("stream", "false"))
        .and(header("X-Algolia-Application-Id", "APP123"))
        .and(header("X-Algolia-API-Key", "secret-key"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "parts": [{"type": "text", "text": "Search status: 500"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "role": "assistant",
            "parts": [{"type": "text", "text": "Pick a city."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = client(&server);
    let ctx = ConversationContext {
        result_count: 500,
        ..Default::default()
    };
    let resp = agent.send_message("Search status: 500", Some(&ctx)).await.unwrap();

    assert_eq!(resp.message, "Pick a city.");
    let history = agent.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Pick a city.");
}

#[tokio::test]
async fn content_field_is_accepted_and_suggestions_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/1/agents/{AGENT_ID}/completions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "Narrow by city",
            "filters": {"city": "Lyon"}
        })))
        .mount(&server)
        .await;

    let mut agent = client(&server);
    let resp = agent.send_message("hi", None).await.unwrap();
    assert_eq!(resp.message, "Narrow by city");
    assert_eq!(resp.suggestions.len(), 1);
    assert_eq!(resp.suggestions[0].field.as_deref(), Some("city"));
    assert!(agent.history()[1].suggestions.is_some());
}

#[tokio::test]
async fn unpublished_agent_is_reported_distinctly() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/1/agents/{AGENT_ID}/completions")))
        .respond_with(ResponseTemplate::new(422).set_body_string("agent is draft"))
        .mount(&server)
        .await;

    let mut agent = client(&server);
    let err = agent.send_message("hi", None).await.unwrap_err();
    assert!(matches!(err, AgentError::NotPublished { ref message } if message == "agent is draft"));
    assert!(err.to_string().contains("not published"));

    // The outgoing turn stays in history, no assistant turn is added.
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/1/agents/{AGENT_ID}/completions")))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = client(&server);
    let err = agent.send_message("hi", None).await.unwrap_err();
    match err {
        AgentError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn history_accumulates_and_resets() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/1/agents/{AGENT_ID}/completions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .mount(&server)
        .await;

    let mut agent = client(&server);
    agent.send_message("one", None).await.unwrap();
    agent.send_message("two", None).await.unwrap();
    assert_eq!(agent.history().len(), 4);

    let requests = server.received_requests().await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(second["messages"].as_array().unwrap().len(), 3);

    agent.reset_session();
    assert!(agent.history().is_empty());
    assert!(second.get("configuration").is_none());
}

#[tokio::test]
async fn context_is_sent_as_configuration() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/1/agents/{AGENT_ID}/completions")))
        .and(body_partial_json(json!({
            "configuration": {
                "searchParameters": {"query": "canal", "filters": {"city": "Paris"}},
                "resultCount": 42
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut ctx = ConversationContext {
        current_query: Some("canal".to_string()),
        result_count: 42,
        ..Default::default()
    };
    ctx.applied_filters.insert("city".into(), "Paris".into());

    let mut agent = client(&server);
    let resp = agent.send_message("hi", Some(&ctx)).await.unwrap();
    assert_eq!(resp.message, "ok");
}

#[tokio::test]
async fn missing_query_is_sent_as_empty_string() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/1/agents/{AGENT_ID}/completions")))
        .and(body_partial_json(json!({
            "configuration": {"searchParameters": {"query": "", "filters": {}}, "resultCount": 0}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = client(&server);
    agent
        .send_message("hi", Some(&ConversationContext::default()))
        .await
        .unwrap();
}

#[tokio::test]
async fn validate_agent_reads_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/1/agents/{AGENT_ID}")))
        .and(header("X-Algolia-Application-Id", "APP123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": AGENT_ID,
            "name": "Stay finder",
            "status": "published"
        })))
        .mount(&server)
        .await;

    let info = client(&server).validate_agent().await.unwrap();
    assert_eq!(info.name.as_deref(), Some("Stay finder"));
}

#[tokio::test]
async fn validate_agent_surfaces_missing_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/1/agents/{AGENT_ID}")))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client(&server).validate_agent().await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}
