//! OllamaClient: the concrete `LLMClient` transport used by the CLI. Talks to
//! a local or remote Ollama `/api/chat` endpoint over HTTP, same `reqwest`
//! idiom as `google_translate.rs`'s fallback provider.

use crate::error::{PipelineError, Result};
use crate::llm::{ChatMessage, LLMClient};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

pub struct OllamaClient {
    client: Client,
    url: String,
}

impl OllamaClient {
    pub fn new(url: String) -> Self {
        Self { client: Client::new(), url }
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn chat(&self, model: &str, messages: &[ChatMessage], timeout: Duration) -> Result<String> {
        let request = ChatRequest { model, messages, stream: false };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| PipelineError::LLMTransport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::LLMTransport(format!(
                "ollama returned status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::LLMTransport(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn chat_parses_message_content_from_a_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": { "content": "Bonjour" }
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(format!("{}/api/chat", server.uri()));
        let messages = vec![ChatMessage { role: "user", content: "Hello".to_string() }];
        let reply = client.chat("gemma2:27b", &messages, Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply, "Bonjour");
    }

    #[tokio::test]
    async fn chat_surfaces_non_success_status_as_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OllamaClient::new(format!("{}/api/chat", server.uri()));
        let messages = vec![ChatMessage { role: "user", content: "Hello".to_string() }];
        let result = client.chat("gemma2:27b", &messages, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(PipelineError::LLMTransport(_))));
    }
}
