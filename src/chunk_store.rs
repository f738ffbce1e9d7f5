//! ChunkStore (C17): persists the per-batch sentence payload as individually
//! rewritable files, resolves chunk URLs, prunes stale files, and resolves
//! the dominant highlighting policy across a job's committed chunks.

use crate::error::Result;
use crate::model::Chunk;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The stripped pointer record left in the job payload once a chunk's heavy
/// fields (sentences, raw track maps) have been moved into its own file.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPointer {
    pub chunk_id: String,
    pub range_fragment: String,
    pub start_sentence: usize,
    pub end_sentence: usize,
    pub sentence_count: usize,
    pub metadata_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighting_policy: Option<String>,
}

#[derive(Serialize)]
struct ChunkFilePayload<'a> {
    version: u32,
    chunk_id: &'a str,
    range_fragment: &'a str,
    start_sentence: usize,
    end_sentence: usize,
    sentence_count: usize,
    sentences: &'a [crate::model::ChunkSentence],
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_tracks: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timing_tracks: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlighting_policy: Option<String>,
}

pub fn format_chunk_filename(index: usize) -> String {
    format!("chunk_{index:04}.json")
}

pub struct ChunkStore {
    metadata_root: PathBuf,
}

impl ChunkStore {
    pub fn new(metadata_root: impl Into<PathBuf>) -> Self {
        Self { metadata_root: metadata_root.into() }
    }

    /// Writes one file per chunk with non-empty `sentences`, atomically
    /// (tmp + rename), and returns the stripped pointer records to store in
    /// the job payload. Deletes any stale `chunk_*.json` not in the
    /// resulting set.
    pub fn write_chunks(&self, chunks: &[Chunk], url_base: Option<&str>) -> Result<Vec<ChunkPointer>> {
        std::fs::create_dir_all(&self.metadata_root)?;

        let mut pointers = Vec::with_capacity(chunks.len());
        let mut preserved: HashSet<String> = HashSet::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.sentences.is_empty() {
                continue;
            }
            let filename = format_chunk_filename(index);
            let destination = self.metadata_root.join(&filename);

            let payload = ChunkFilePayload {
                version: 3,
                chunk_id: &chunk.chunk_id,
                range_fragment: &chunk.range_fragment,
                start_sentence: chunk.start_sentence,
                end_sentence: chunk.end_sentence,
                sentence_count: chunk.sentences.len(),
                sentences: &chunk.sentences,
                audio_tracks: chunk.audio_tracks.clone(),
                timing_tracks: chunk.timing_tracks.clone(),
                highlighting_policy: chunk.highlighting_policy.clone(),
            };
            write_atomic(&destination, &payload)?;
            preserved.insert(filename.clone());

            let metadata_path = format!("metadata/{filename}");
            pointers.push(ChunkPointer {
                chunk_id: chunk.chunk_id.clone(),
                range_fragment: chunk.range_fragment.clone(),
                start_sentence: chunk.start_sentence,
                end_sentence: chunk.end_sentence,
                sentence_count: chunk.sentences.len(),
                metadata_url: url_base.map(|base| format!("{base}/{metadata_path}")),
                metadata_path,
                highlighting_policy: chunk.highlighting_policy.clone(),
            });
        }

        self.cleanup_unused(&preserved)?;
        Ok(pointers)
    }

    fn cleanup_unused(&self, preserved: &HashSet<String>) -> Result<()> {
        let Ok(entries) = std::fs::read_dir(&self.metadata_root) else {
            return Ok(());
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with("chunk_") && name.ends_with(".json") && !preserved.contains(name) {
                let _ = std::fs::remove_file(entry.path());
                debug!(file = name, "removed stale chunk metadata file");
            }
        }
        Ok(())
    }

    /// Scans committed chunk files and returns the dominant highlighting
    /// policy, preferring an "estimated"-prefixed policy if any chunk uses
    /// one (so the UI can show the worst-case label).
    pub fn resolve_highlighting_policy(&self) -> Option<String> {
        let mut fallback = None;
        let Ok(entries) = std::fs::read_dir(&self.metadata_root) else {
            return None;
        };
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("chunk_") && n.ends_with(".json"))
            })
            .collect();
        paths.sort();

        for path in paths {
            let Ok(contents) = std::fs::read_to_string(&path) else { continue };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&contents) else { continue };
            let Some(policy) = value.get("highlighting_policy").and_then(|v| v.as_str()) else {
                continue;
            };
            let policy = policy.trim();
            if policy.is_empty() {
                continue;
            }
            if is_estimated_policy(policy) {
                return Some(policy.to_string());
            }
            if fallback.is_none() {
                fallback = Some(policy.to_string());
            }
        }
        fallback
    }
}

fn is_estimated_policy(policy: &str) -> bool {
    policy.to_lowercase().starts_with("estimated")
}

fn write_atomic<T: Serialize>(destination: &Path, payload: &T) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(payload)?;
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        destination.file_name().and_then(|n| n.to_str()).unwrap_or("chunk")
    ));
    std::fs::write(&tmp_path, serialized)?;
    std::fs::rename(&tmp_path, destination)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChunkSentence;

    fn chunk(index: usize, sentence_count: usize) -> Chunk {
        Chunk {
            chunk_id: format!("c{index}"),
            range_fragment: format!("{:04}-{:04}", index * 10 + 1, index * 10 + sentence_count),
            start_sentence: index * 10 + 1,
            end_sentence: index * 10 + sentence_count,
            sentence_count,
            sentences: (0..sentence_count)
                .map(|i| ChunkSentence {
                    number: index * 10 + i + 1,
                    source: "hi".to_string(),
                    translation: "salut".to_string(),
                    transliteration: None,
                })
                .collect(),
            audio_tracks: None,
            timing_tracks: None,
            highlighting_policy: None,
        }
    }

    #[test]
    fn writes_chunk_files_and_returns_stripped_pointers() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let chunks = vec![chunk(0, 3)];
        let pointers = store.write_chunks(&chunks, Some("https://example.test")).unwrap();

        assert_eq!(pointers.len(), 1);
        assert_eq!(pointers[0].metadata_path, "metadata/chunk_0000.json");
        assert!(dir.path().join("chunk_0000.json").exists());
    }

    #[test]
    fn skips_empty_chunks_and_prunes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chunk_0099.json"), "{}").unwrap();
        let store = ChunkStore::new(dir.path());
        let chunks = vec![chunk(0, 2)];
        store.write_chunks(&chunks, None).unwrap();

        assert!(!dir.path().join("chunk_0099.json").exists());
        assert!(dir.path().join("chunk_0000.json").exists());
    }

    #[test]
    fn prefers_estimated_prefixed_policy_over_first_seen() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("chunk_0000.json"),
            r#"{"highlighting_policy": "exact"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("chunk_0001.json"),
            r#"{"highlighting_policy": "estimated-word-level"}"#,
        )
        .unwrap();
        let store = ChunkStore::new(dir.path());
        assert_eq!(store.resolve_highlighting_policy().as_deref(), Some("estimated-word-level"));
    }

    #[test]
    fn falls_back_to_first_policy_when_none_estimated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chunk_0000.json"), r#"{"highlighting_policy": "exact"}"#).unwrap();
        let store = ChunkStore::new(dir.path());
        assert_eq!(store.resolve_highlighting_policy().as_deref(), Some("exact"));
    }
}
