#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Chat-completions client and answer composer against a mock HTTP server

use docqa::RagError;
use docqa::config::GenerationConfig;
use docqa::generation::{AnswerComposer, ChatClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        base_url: format!("{}/openai/v1", server.uri()),
        model: "text-model".to_string(),
        vision_model: "vision-model".to_string(),
        timeout_secs: 5,
        ..GenerationConfig::default()
    }
}

fn composer_for(server: &MockServer) -> AnswerComposer {
    let client = ChatClient::new(&config_for(server), "test-key").expect("client builds");
    AnswerComposer::new(Box::new(client))
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    }))
}

#[tokio::test]
async fn answer_sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "text-model",
            "temperature": 0.3,
            "max_tokens": 200
        })))
        .respond_with(completion("Alpha is the first letter."))
        .expect(1)
        .mount(&server)
        .await;

    let composer = composer_for(&server);
    let answer = tokio::task::spawn_blocking(move || {
        composer.answer("What is Alpha?", &["Alpha Beta".to_string()], 0.3, 200)
    })
    .await
    .expect("blocking task completes")
    .expect("answer generated");

    assert_eq!(answer, "Alpha is the first letter.");

    let requests = server.received_requests().await.unwrap_or_default();
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request is JSON");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert!(
        body["messages"][1]["content"]
            .as_str()
            .is_some_and(|content| content.contains("Source 0: Alpha Beta"))
    );
}

#[tokio::test]
async fn service_error_message_is_surfaced_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid API Key", "type": "invalid_request_error" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let composer = composer_for(&server);
    let result = tokio::task::spawn_blocking(move || composer.answer("q", &[], 0.7, 10))
        .await
        .expect("blocking task completes");

    assert!(matches!(
        result,
        Err(RagError::Service(message)) if message.contains("401") && message.contains("Invalid API Key")
    ));
}

#[tokio::test]
async fn summary_omits_sampling_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(completion("A short summary."))
        .expect(1)
        .mount(&server)
        .await;

    let composer = composer_for(&server);
    let summary = tokio::task::spawn_blocking(move || {
        composer.summarize(&["Page one.".to_string(), "Page two.".to_string()])
    })
    .await
    .expect("blocking task completes")
    .expect("summary generated");

    assert_eq!(summary, "A short summary.");

    let requests = server.received_requests().await.unwrap_or_default();
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request is JSON");
    assert!(body.get("temperature").is_none());
    assert_eq!(
        body["messages"][1]["content"],
        "Document Content:\nPage one.\nPage two."
    );
}

#[tokio::test]
async fn blank_summary_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let composer = composer_for(&server);
    let result = tokio::task::spawn_blocking(move || {
        composer.summarize(&[String::new(), "  \n ".to_string()])
    })
    .await
    .expect("blocking task completes");

    assert!(matches!(result, Err(RagError::EmptySummarizationInput)));
}

#[tokio::test]
async fn image_description_uses_vision_model_and_data_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "vision-model" })))
        .respond_with(completion("A black square."))
        .expect(1)
        .mount(&server)
        .await;

    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let composer = composer_for(&server);
    let description = tokio::task::spawn_blocking(move || composer.describe_image(&png))
        .await
        .expect("blocking task completes")
        .expect("description generated");

    assert_eq!(description, "A black square.");

    let requests = server.received_requests().await.unwrap_or_default();
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request is JSON");
    let parts = &body["messages"][0]["content"];
    assert_eq!(parts[0]["type"], "text");
    assert!(
        parts[1]["image_url"]["url"]
            .as_str()
            .is_some_and(|url| url.starts_with("data:image/png;base64,"))
    );
}
