use serde_json::json;
use studysyncd::ai::{GenerationError, OpenAiGenerator, TextGenerator};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn upstream(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn generator(server: &MockServer) -> OpenAiGenerator {
    OpenAiGenerator::new(&server.uri(), "test-key", "gpt-4o-mini")
}

#[tokio::test]
async fn completion_content_is_returned() {
    let server = upstream(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "1. Review notes" } }]
    })))
    .await;
    let text = generator(&server).generate("tips please").await.expect("completion");
    assert_eq!(text, "1. Review notes");
}

#[tokio::test]
async fn too_many_requests_is_quota() {
    let server = upstream(ResponseTemplate::new(429).set_body_string("rate limited")).await;
    let err = generator(&server).generate("tips").await.expect_err("429");
    assert!(matches!(err, GenerationError::Quota(_)), "{err:?}");
}

#[tokio::test]
async fn insufficient_quota_body_is_quota() {
    let server = upstream(ResponseTemplate::new(400).set_body_json(json!({
        "error": { "type": "insufficient_quota", "message": "You exceeded your current quota" }
    })))
    .await;
    let err = generator(&server).generate("tips").await.expect_err("quota");
    assert!(matches!(err, GenerationError::Quota(_)), "{err:?}");
}

#[tokio::test]
async fn server_error_is_generic_failure() {
    let server = upstream(ResponseTemplate::new(500).set_body_string("boom")).await;
    let err = generator(&server).generate("tips").await.expect_err("500");
    match err {
        GenerationError::Failed(msg) => assert!(msg.contains("500"), "{msg}"),
        other => panic!("expected generic failure, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_generic_failure() {
    let server = upstream(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] }))).await;
    let err = generator(&server).generate("tips").await.expect_err("empty");
    assert!(matches!(err, GenerationError::Failed(_)), "{err:?}");
}
