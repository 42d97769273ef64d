use serde_json::json;
use std::time::Duration;
use stepweave_agent::{HttpOracle, HttpOracleConfig};
use stepweave_core::{Oracle, OracleError, OracleRequest};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

fn oracle(server: &MockServer) -> HttpOracle {
    HttpOracle::new(
        HttpOracleConfig::new(format!("{}/v1/", server.uri()), "default-model")
            .with_api_key("sk-test")
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn text_completion_sends_chat_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "default-model",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let text = oracle(&server)
        .complete_text(OracleRequest::new("hello").with_system("be brief"))
        .await
        .unwrap();
    assert_eq!(text, "hi there");
}

#[tokio::test]
async fn structured_completion_extracts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "planner-model",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            "```json\n{\"is_complete\": true, \"reason\": \"done\"}\n```",
        )))
        .mount(&server)
        .await;

    let value = oracle(&server)
        .complete_structured(
            OracleRequest::new("plan").with_model(Some("planner-model")),
            &json!({"type": "object"}),
        )
        .await
        .unwrap();
    assert_eq!(value, json!({"is_complete": true, "reason": "done"}));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let system = body["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("JSON schema"));
}

#[tokio::test]
async fn error_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = oracle(&server)
        .complete_text(OracleRequest::new("x"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        OracleError::Rejected {
            status: 429,
            message: "rate limited".into()
        }
    );
}

#[tokio::test]
async fn prose_without_json_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("I cannot decide.")))
        .mount(&server)
        .await;

    let err = oracle(&server)
        .complete_structured(OracleRequest::new("x"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Malformed(_)));
}

#[tokio::test]
async fn empty_choices_are_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = oracle(&server)
        .complete_text(OracleRequest::new("x"))
        .await
        .unwrap_err();
    assert_eq!(err, OracleError::EmptyResponse);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply("late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(
        HttpOracleConfig::new(server.uri(), "m").with_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let err = oracle.complete_text(OracleRequest::new("x")).await.unwrap_err();
    assert_eq!(err, OracleError::Timeout(Duration::from_millis(100)));
}
