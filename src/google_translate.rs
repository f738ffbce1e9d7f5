//! GoogleFallbackProvider (C7): optional alternative translator, selected by
//! configuration. Health-checks once per process and caches the outcome.

use crate::progress::ProgressTracker;
use crate::text::is_placeholder_response;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 5;
const INTER_ATTEMPT_PAUSE: Duration = Duration::from_secs(1);

/// Pseudo-suffixes the Google Translate language parameter sometimes carries
/// (e.g. "en-orig" from auto-detected subtitle tracks); stripped before
/// lookup.
const PSEUDO_SUFFIXES: &[&str] = &["-orig", "-auto"];

static LANGUAGE_CODES: &[(&str, &str)] = &[
    ("english", "en"),
    ("french", "fr"),
    ("spanish", "es"),
    ("german", "de"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("arabic", "ar"),
    ("hebrew", "iw"),
    ("hindi", "hi"),
    ("thai", "th"),
    ("khmer", "km"),
];

/// Resolves a language name, code, or pseudo-suffixed code into a Google
/// Translate language code. Chinese variants collapse to `zh-cn`/`zh-tw`.
pub fn resolve_language_code(input: &str) -> String {
    let mut value = input.to_lowercase();
    for suffix in PSEUDO_SUFFIXES {
        if let Some(stripped) = value.strip_suffix(suffix) {
            value = stripped.to_string();
            break;
        }
    }

    match value.as_str() {
        "zh-hans" | "zh-cn" | "zh-sg" | "chinese-simplified" => return "zh-cn".to_string(),
        "zh-hant" | "zh-tw" | "zh-hk" | "zh-mo" | "chinese-traditional" => return "zh-tw".to_string(),
        _ => {}
    }

    LANGUAGE_CODES
        .iter()
        .find(|(name, code)| *name == value || *code == value)
        .map(|(_, code)| code.to_string())
        .unwrap_or(value)
}

static HEALTH_CHECK: OnceCell<bool> = OnceCell::new();

/// Verifies the HTTP transport dependency once per process; the outcome is
/// cached for subsequent calls.
async fn health_check(client: &Client) -> bool {
    if let Some(&cached) = HEALTH_CHECK.get() {
        return cached;
    }
    let ok = client
        .get("https://translate.googleapis.com/translate_a/single")
        .query(&[("client", "gtx"), ("sl", "en"), ("tl", "fr"), ("dt", "t"), ("q", "hello")])
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false);
    let _ = HEALTH_CHECK.set(ok);
    ok
}

#[derive(Debug, Deserialize)]
struct RawTranslateResponse(Vec<Vec<serde_json::Value>>);

pub struct GoogleFallbackProvider {
    client: Client,
    progress: Option<Arc<ProgressTracker>>,
}

impl GoogleFallbackProvider {
    pub fn new(progress: Option<Arc<ProgressTracker>>) -> Self {
        Self { client: Client::new(), progress }
    }

    pub async fn is_available(&self) -> bool {
        health_check(&self.client).await
    }

    /// Up to 5 attempts with a 1-second inter-attempt pause. Every retry is
    /// reported to the progress tracker.
    pub async fn translate(&self, sentence: &str, source_lang: &str, target_lang: &str) -> (String, Option<String>) {
        let source = resolve_language_code(source_lang);
        let target = resolve_language_code(target_lang);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt_translate(sentence, &source, &target).await {
                Ok(text) if !text.is_empty() && !is_placeholder_response(&text) => {
                    return (text, None);
                }
                Ok(_) => {
                    self.record_retry("empty or placeholder result");
                }
                Err(e) => {
                    warn!("google translate attempt {attempt} failed: {e}");
                    self.record_retry(&e);
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(INTER_ATTEMPT_PAUSE).await;
            }
        }

        (
            format!("Retry failed for google_translate after {MAX_ATTEMPTS} attempts: exhausted"),
            Some("exhausted retries".to_string()),
        )
    }

    fn record_retry(&self, reason: &str) {
        if let Some(progress) = &self.progress {
            progress.record_retry("translation", reason);
        }
    }

    async fn attempt_translate(&self, sentence: &str, source: &str, target: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get("https://translate.googleapis.com/translate_a/single")
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", sentence),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let parsed: RawTranslateResponse = response.json().await.map_err(|e| e.to_string())?;
        let text = parsed
            .0
            .first()
            .map(|segments| {
                segments
                    .iter()
                    .filter_map(|seg| seg.get(0).and_then(|v| v.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(text)
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> (String, Option<String>);
}

#[async_trait]
impl Translator for GoogleFallbackProvider {
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> (String, Option<String>) {
        GoogleFallbackProvider::translate(self, text, source_lang, target_lang).await
    }
}
