use companion_provider::{GeminiProvider, LlmMessage, LlmProvider, LlmRequest};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_gemini_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"text": text}]
            },
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
    })
}

fn chat_request() -> LlmRequest {
    LlmRequest {
        model: "gemini-2.5-flash".into(),
        system_instruction: Some("You are a supportive, casual best friend.".into()),
        temperature: Some(0.7),
        messages: vec![LlmMessage::user("I feel anxious")],
        max_tokens: 2048,
    }
}

#[tokio::test]
async fn gemini_basic_chat_with_key_and_body_verification() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "systemInstruction": {
                "parts": [{"text": "You are a supportive, casual best friend."}]
            },
            "generationConfig": {"temperature": 0.7},
            "contents": [{"role": "user", "parts": [{"text": "I feel anxious"}]}]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(mock_gemini_response("That sounds rough.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
    let resp = provider.chat(chat_request()).await.unwrap();

    assert_eq!(resp.text, "That sounds rough.");
    assert_eq!(resp.input_tokens, Some(10));
    assert_eq!(resp.output_tokens, Some(5));
}

#[tokio::test]
async fn gemini_server_error_is_retryable_labeled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
    let err = provider.chat(chat_request()).await.err().unwrap();

    let msg = err.to_string();
    assert!(msg.contains("gemini api error"));
    assert!(msg.contains("[retryable]"));
    assert!(msg.contains("overloaded"));
}

#[tokio::test]
async fn gemini_client_error_is_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("bad-key").with_base_url(server.uri());
    let err = provider.chat(chat_request()).await.err().unwrap();

    assert!(!err.to_string().contains("[retryable]"));
}

#[tokio::test]
async fn gemini_malformed_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
    assert!(provider.chat(chat_request()).await.is_err());
}

#[tokio::test]
async fn gemini_empty_candidates_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": []
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
    let err = provider.chat(chat_request()).await.err().unwrap();
    assert!(err.to_string().contains("empty candidates"));
}
