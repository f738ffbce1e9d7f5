//! Core data model: sentences, translation/media results, batch windows, chunks, jobs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An immutable source sentence. The ordered sequence for a run is fixed at
/// stage entry and never rearranged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// 0-based position within the selected range.
    pub index: usize,
    /// 1-based, globally stable sentence number.
    pub number: usize,
    pub text: String,
}

/// Assigns a target language to a sentence by round-robin over the
/// user-supplied target-language list. Deterministic given the starting
/// index and the language list.
pub fn assign_target_language<'a>(
    start_index: usize,
    sentence_index: usize,
    languages: &'a [String],
) -> &'a str {
    debug_assert!(!languages.is_empty());
    let offset = (start_index + sentence_index) % languages.len();
    &languages[offset]
}

/// Outcome of translating one sentence into one target language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub index: usize,
    pub number: usize,
    pub source_text: String,
    pub target_language: String,
    pub translation: String,
    pub transliteration: Option<String>,
    pub retry_count: u32,
    pub error: Option<String>,
}

impl TranslationResult {
    /// Build a result whose retry budget was exhausted. `translation` carries
    /// a structured, human-readable failure annotation rather than raw model
    /// noise, so downstream stages can render placeholder media for it.
    pub fn failed(
        index: usize,
        number: usize,
        source_text: String,
        target_language: String,
        stage: &str,
        attempts: u32,
        reason: &str,
    ) -> Self {
        Self {
            index,
            number,
            source_text,
            target_language,
            translation: format!(
                "Retry failed for {stage} after {attempts} attempts: {reason}"
            ),
            transliteration: None,
            retry_count: attempts,
            error: Some(reason.to_string()),
        }
    }
}

/// An opaque handle to a synthesized audio segment. Concatenation and MP3
/// export are delegated to whatever `MediaSynthesizer` produced it.
pub trait AudioSegment: Send + Sync {
    fn duration_ms(&self) -> u64;
}

/// Per-sentence media derived from a `TranslationResult`.
pub struct MediaItem {
    pub index: usize,
    pub number: usize,
    pub target_language: String,
    pub sentence: String,
    pub translation: String,
    pub transliteration: Option<String>,
    pub audio: Option<Box<dyn AudioSegment>>,
    pub video_block: String,
}

impl std::fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaItem")
            .field("index", &self.index)
            .field("number", &self.number)
            .field("target_language", &self.target_language)
            .field("has_audio", &self.audio.is_some())
            .finish()
    }
}

/// A contiguous half-open `[first_number, last_number]` range of sentences
/// flushed together at the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub first_number: usize,
    pub last_number: usize,
}

impl BatchWindow {
    /// Zero-padded `FFFF-LLLL` filename fragment.
    pub fn range_fragment(&self) -> String {
        format!("{:04}-{:04}", self.first_number, self.last_number)
    }
}

/// The persisted form of a batch window, one file per chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub range_fragment: String,
    pub start_sentence: usize,
    pub end_sentence: usize,
    pub sentence_count: usize,
    pub sentences: Vec<ChunkSentence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_tracks: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_tracks: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighting_policy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSentence {
    pub number: usize,
    pub source: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transliteration: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Pipeline,
    Subtitle,
    YoutubeDub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A persisted, resumable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub request_payload: serde_json::Value,
    pub resume_context: serde_json::Value,
    pub result_payload: serde_json::Value,
    pub owner_user_id: String,
    pub owner_role: OwnerRole,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerRole {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Book,
    Movie,
    TvSeries,
    TvEpisode,
    YoutubeVideo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    OpenLibrary,
    GoogleBooks,
    Wikipedia,
    Tmdb,
    Omdb,
    TvMaze,
    YtDlp,
}

impl std::fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceIds {
    pub isbn: Option<String>,
    pub imdb: Option<String>,
    pub tmdb: Option<String>,
}

impl SourceIds {
    /// Element-wise merge preferring `self`'s non-null values.
    pub fn merge_with(&self, other: &SourceIds) -> SourceIds {
        SourceIds {
            isbn: self.isbn.clone().or_else(|| other.isbn.clone()),
            imdb: self.imdb.clone().or_else(|| other.imdb.clone()),
            tmdb: self.tmdb.clone().or_else(|| other.tmdb.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub name: String,
    pub position: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedMetadataResult {
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
    pub year: Option<u32>,
    pub genres: Vec<String>,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    pub cover_file: Option<String>,
    pub series: Option<SeriesInfo>,
    pub source_ids: SourceIds,
    pub author: Option<String>,
    pub language: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub rating: Option<f64>,
    pub votes: Option<u64>,
    pub channel_name: Option<String>,
    pub view_count: Option<u64>,
    pub upload_date: Option<String>,
    pub confidence: ConfidenceLevel,
    pub primary_source: Option<MetadataSource>,
    pub contributing_sources: Vec<MetadataSource>,
    pub queried_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_responses: Option<HashMap<String, serde_json::Value>>,
}

impl UnifiedMetadataResult {
    /// Fields required to treat a HIGH-confidence result as good enough to
    /// stop the provider fallback chain early.
    pub fn has_required_fields(&self) -> bool {
        !self.title.is_empty()
            && self.year.is_some()
            && !self.genres.is_empty()
            && self.summary.is_some()
            && (self.cover_url.is_some() || self.cover_file.is_some())
    }

    /// Serializes to a JSON value, optionally dropping `raw_responses`.
    pub fn to_json(&self, include_raw: bool) -> serde_json::Value {
        let mut value = serde_json::to_value(self).expect("UnifiedMetadataResult is serializable");
        if !include_raw {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("raw_responses");
            }
        }
        value
    }
}

#[derive(Debug, Clone)]
pub struct LookupQuery {
    pub media_type: MediaType,
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub series_name: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u32>,
    pub youtube_video_id: Option<String>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub source_filename: Option<String>,
}

impl LookupQuery {
    /// Ordered salient fields used to build the cache key; order matters.
    pub fn cache_key_parts(&self) -> Vec<String> {
        vec![
            format!("{:?}", self.media_type),
            self.title.clone().unwrap_or_default(),
            self.author.clone().unwrap_or_default(),
            self.isbn.clone().unwrap_or_default(),
            self.series_name.clone().unwrap_or_default(),
            self.season.map(|s| s.to_string()).unwrap_or_default(),
            self.episode.map(|e| e.to_string()).unwrap_or_default(),
            self.youtube_video_id.clone().unwrap_or_default(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub force_refresh: bool,
    pub skip_cache: bool,
    pub max_sources: usize,
    pub timeout_seconds: f64,
    pub include_raw_responses: bool,
    pub download_cover: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            force_refresh: false,
            skip_cache: false,
            max_sources: 3,
            timeout_seconds: 30.0,
            include_raw_responses: false,
            download_cover: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_assignment_cycles_from_start_index() {
        let langs = vec!["ar".to_string(), "en".to_string(), "fr".to_string()];
        let assigned: Vec<&str> = (0..7)
            .map(|i| assign_target_language(0, i, &langs))
            .collect();
        assert_eq!(assigned, vec!["ar", "en", "fr", "ar", "en", "fr", "ar"]);
    }

    #[test]
    fn batch_window_range_fragment_is_zero_padded() {
        let window = BatchWindow {
            first_number: 1,
            last_number: 10,
        };
        assert_eq!(window.range_fragment(), "0001-0010");
    }

    #[test]
    fn failed_translation_carries_annotation_not_raw_text() {
        let result = TranslationResult::failed(
            0,
            1,
            "hello".to_string(),
            "ar".to_string(),
            "translation",
            5,
            "unexpected script used",
        );
        assert!(result.translation.starts_with("Retry failed for translation after 5 attempts"));
        assert_eq!(result.retry_count, 5);
        assert!(result.error.is_some());
    }

    #[test]
    fn required_fields_gate_blocks_high_confidence_without_summary() {
        let mut result = UnifiedMetadataResult {
            title: "1984".to_string(),
            year: Some(1949),
            genres: vec!["Dystopian".to_string()],
            cover_url: Some("https://example.test/cover.jpg".to_string()),
            confidence: ConfidenceLevel::High,
            ..Default::default()
        };
        assert!(!result.has_required_fields());
        result.summary = Some("A dystopian novel.".to_string());
        assert!(result.has_required_fields());
    }

    #[test]
    fn source_ids_merge_prefers_self() {
        let a = SourceIds {
            isbn: Some("123".to_string()),
            imdb: None,
            tmdb: None,
        };
        let b = SourceIds {
            isbn: Some("999".to_string()),
            imdb: Some("tt1".to_string()),
            tmdb: None,
        };
        let merged = a.merge_with(&b);
        assert_eq!(merged.isbn.as_deref(), Some("123"));
        assert_eq!(merged.imdb.as_deref(), Some("tt1"));
    }
}
