//! LLM transport contract (consumed) and LLMBatchClient (C6): builds batch
//! request payloads, invokes the transport, and parses responses tolerantly.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The LLM transport the core consumes: one synchronous call, no implicit
/// retries at this layer.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, model: &str, messages: &[ChatMessage], timeout: Duration) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct BatchItemRequest<'a> {
    id: u64,
    text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchItemResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub index: Option<serde_json::Value>,
    #[serde(default)]
    pub sentence_id: Option<serde_json::Value>,
    #[serde(default)]
    pub sentence: Option<serde_json::Value>,
    #[serde(default)]
    pub sentence_number: Option<serde_json::Value>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub transliteration: Option<String>,
}

impl BatchItemResponse {
    /// Extracts an id from any of `id|index|sentence_id|sentence|sentence_number`,
    /// coercing ints or numeric strings.
    pub fn resolved_id(&self) -> Option<u64> {
        [
            &self.id,
            &self.index,
            &self.sentence_id,
            &self.sentence,
            &self.sentence_number,
        ]
        .into_iter()
        .find_map(|candidate| candidate.as_ref().and_then(coerce_numeric_value))
    }
}

fn coerce_numeric_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BatchPayloadShape {
    Keyed { items: Vec<BatchItemResponse> },
    Bare(Vec<BatchItemResponse>),
}

/// Extracts the item list whether the response wraps them in `{"items": [...]}` or
/// is a bare top-level list.
pub fn extract_batch_items(raw: &str) -> Result<Vec<BatchItemResponse>> {
    let shape: BatchPayloadShape = serde_json::from_str(raw)?;
    Ok(match shape {
        BatchPayloadShape::Keyed { items } => items,
        BatchPayloadShape::Bare(items) => items,
    })
}

#[derive(Debug, Clone)]
pub struct ResolvedBatchItem {
    pub id: u64,
    pub translation: String,
    pub transliteration: Option<String>,
}

/// Resolves a raw item list into `(id -> item)`, falling back to positional
/// mapping when ids are missing/unparseable and the counts match. Duplicate
/// ids collapse to the first occurrence.
pub fn resolve_batch_items(raw_items: Vec<BatchItemResponse>, request_ids: &[u64]) -> Vec<ResolvedBatchItem> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    let any_id_missing = raw_items.iter().any(|i| i.resolved_id().is_none());
    let positional = any_id_missing && raw_items.len() == request_ids.len();

    for (i, item) in raw_items.into_iter().enumerate() {
        let id = if positional {
            request_ids[i]
        } else {
            match item.resolved_id() {
                Some(id) => id,
                None => continue,
            }
        };
        if !seen.insert(id) {
            continue;
        }
        resolved.push(ResolvedBatchItem {
            id,
            translation: item.translation.unwrap_or_default(),
            transliteration: item.transliteration,
        });
    }

    resolved
}

#[derive(Debug)]
pub struct BatchResponse {
    pub items: Option<Vec<ResolvedBatchItem>>,
    pub raw_text: String,
    pub error: Option<String>,
    pub elapsed: Duration,
}

pub struct LLMBatchClient {
    client: std::sync::Arc<dyn LLMClient>,
    model: String,
}

const REQUEST_ATTEMPTS: u32 = 4;
const REQUEST_RETRY_DELAY: Duration = Duration::from_millis(500);

impl LLMBatchClient {
    pub fn new(client: std::sync::Arc<dyn LLMClient>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds and sends a batch request, retrying up to `REQUEST_ATTEMPTS`
    /// times on transport failure or when `validator` rejects the payload.
    pub async fn request_batch<V>(
        &self,
        system_prompt: &str,
        items: &[(u64, &str)],
        timeout: Duration,
        validator: V,
    ) -> BatchResponse
    where
        V: Fn(&[ResolvedBatchItem]) -> bool,
    {
        let start = Instant::now();
        let ids: Vec<u64> = items.iter().map(|(id, _)| *id).collect();
        let user_message = build_batch_user_message(items);
        let mut last_error = None;

        for attempt in 1..=REQUEST_ATTEMPTS {
            let messages = vec![
                ChatMessage { role: "system", content: system_prompt.to_string() },
                ChatMessage { role: "user", content: user_message.clone() },
            ];

            let raw = match self.client.chat(&self.model, &messages, timeout).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("batch request attempt {attempt} transport error: {e}");
                    last_error = Some(e.to_string());
                    tokio::time::sleep(REQUEST_RETRY_DELAY).await;
                    continue;
                }
            };

            let raw_items = match extract_batch_items(&raw) {
                Ok(items) if !items.is_empty() => items,
                Ok(_) => {
                    last_error = Some("batch response contained no items".to_string());
                    tokio::time::sleep(REQUEST_RETRY_DELAY).await;
                    continue;
                }
                Err(e) => {
                    debug!("batch response attempt {attempt} not valid JSON: {e}");
                    last_error = Some(format!("invalid JSON: {e}"));
                    tokio::time::sleep(REQUEST_RETRY_DELAY).await;
                    continue;
                }
            };

            let resolved = resolve_batch_items(raw_items, &ids);
            if validator(&resolved) {
                return BatchResponse {
                    items: Some(resolved),
                    raw_text: raw,
                    error: None,
                    elapsed: start.elapsed(),
                };
            }

            last_error = Some("batch response failed validation".to_string());
            tokio::time::sleep(REQUEST_RETRY_DELAY).await;
        }

        BatchResponse {
            items: None,
            raw_text: String::new(),
            error: last_error.or(Some("exhausted retries".to_string())),
            elapsed: start.elapsed(),
        }
    }
}

fn build_batch_user_message(items: &[(u64, &str)]) -> String {
    let payload: Vec<BatchItemRequest> = items
        .iter()
        .map(|(id, text)| BatchItemRequest { id: *id, text })
        .collect();
    serde_json::to_string(&serde_json::json!({ "items": payload }))
        .unwrap_or_else(|_| "{\"items\": []}".to_string())
}

pub fn non_empty_items_validator(items: &[ResolvedBatchItem]) -> bool {
    !items.is_empty() && items.iter().any(|i| !i.translation.trim().is_empty())
}

/// Maps PipelineError transport failures into the LLMTransport kind for
/// callers that need to distinguish transport from validation errors.
pub fn as_transport_error(e: PipelineError) -> PipelineError {
    match e {
        PipelineError::LLMTransport(_) => e,
        other => PipelineError::LLMTransport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Option<i64>, translation: &str) -> BatchItemResponse {
        BatchItemResponse {
            id: id.map(|v| serde_json::json!(v)),
            index: None,
            sentence_id: None,
            sentence: None,
            sentence_number: None,
            translation: Some(translation.to_string()),
            transliteration: None,
        }
    }

    #[test]
    fn extracts_items_from_keyed_payload() {
        let raw = r#"{"items": [{"id": 1, "translation": "Bonjour"}]}"#;
        let items = extract_batch_items(raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].resolved_id(), Some(1));
    }

    #[test]
    fn extracts_items_from_bare_list_payload() {
        let raw = r#"[{"id": 1, "translation": "Bonjour"}]"#;
        let items = extract_batch_items(raw).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn resolves_numeric_string_ids() {
        let response = BatchItemResponse {
            id: Some(serde_json::json!("2")),
            ..item(None, "Hola")
        };
        assert_eq!(response.resolved_id(), Some(2));
    }

    #[test]
    fn falls_back_to_positional_mapping_when_ids_missing_and_counts_match() {
        let items = vec![item(None, "a"), item(None, "b")];
        let resolved = resolve_batch_items(items, &[10, 20]);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].id, 10);
        assert_eq!(resolved[1].id, 20);
    }

    #[test]
    fn does_not_fall_back_positionally_when_counts_differ() {
        let items = vec![item(None, "a"), item(None, "b")];
        let resolved = resolve_batch_items(items, &[10, 20, 30]);
        assert!(resolved.is_empty());
    }

    #[test]
    fn duplicate_ids_collapse_to_first_occurrence() {
        let items = vec![item(Some(1), "first"), item(Some(1), "second")];
        let resolved = resolve_batch_items(items, &[1]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].translation, "first");
    }

    #[test]
    fn non_empty_validator_rejects_all_blank_translations() {
        let items = vec![item(Some(1), ""), item(Some(2), "  ")];
        assert!(!non_empty_items_validator(&items));
        let good = vec![item(Some(1), "Bonjour")];
        assert!(non_empty_items_validator(&good));
    }
}
