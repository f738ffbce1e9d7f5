//! Mock HTTP tests for the LLM transport, exercising `OllamaClient` and
//! `LLMBatchClient` together against a stubbed Ollama server so retry and
//! parsing behavior is verified across both modules at once.

use langforge::config::TranslationProvider;
use langforge::llm::LLMBatchClient;
use langforge::llm::LLMClient;
use langforge::model::Sentence;
use langforge::ollama::OllamaClient;
use langforge::progress::ProgressTracker;
use langforge::translation_engine::TranslationEngine;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn translation_engine_recovers_after_one_malformed_ollama_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": { "content": "not json at all" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": { "content": "{\"items\": [{\"id\": 0, \"translation\": \"Bonjour le monde\"}]}" }
        })))
        .mount(&server)
        .await;

    let transport: Arc<dyn LLMClient> = Arc::new(OllamaClient::new(format!("{}/api/chat", server.uri())));
    let llm = Some(Arc::new(LLMBatchClient::new(transport, "test-model".to_string())));
    let progress = Arc::new(ProgressTracker::new(1));

    let engine = TranslationEngine::new(TranslationProvider::Llm, llm, None, None, None, 1, progress, false);

    let sentences = vec![Sentence { index: 0, number: 1, text: "Hello, world.".to_string() }];
    let targets = vec!["fr".to_string()];
    let results = engine.translate_batch(&sentences, "en", &targets).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].error.is_none());
    assert_eq!(results[0].translation, "Bonjour le monde");
}

#[tokio::test]
async fn translation_engine_yields_failure_annotation_when_ollama_is_unreachable() {
    let server = MockServer::start().await;
    drop(server);

    let transport: Arc<dyn LLMClient> = Arc::new(OllamaClient::new("http://127.0.0.1:1/api/chat".to_string()));
    let llm = Some(Arc::new(LLMBatchClient::new(transport, "test-model".to_string())));
    let progress = Arc::new(ProgressTracker::new(1));

    let engine = TranslationEngine::new(TranslationProvider::Llm, llm, None, None, None, 1, progress, false);

    let sentences = vec![Sentence { index: 0, number: 1, text: "Hello.".to_string() }];
    let targets = vec!["fr".to_string()];
    let results = engine.translate_batch(&sentences, "en", &targets).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].error.is_some());
}
