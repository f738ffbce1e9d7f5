//! Integration tests exercising the full translation/media/export pipeline
//! end to end, plus the job/chunk persistence a run typically sits between.

use langforge::batch_exporter::BatchExporter;
use langforge::config::TranslationProvider;
use langforge::llm::{ChatMessage, LLMBatchClient, LLMClient};
use langforge::media::{AudioOptions, MediaEngine};
use langforge::model::{Chunk, ChunkSentence, Job, JobStatus, JobType, OwnerRole, Sentence};
use langforge::output_writer::HtmlBatchWriter;
use langforge::pipeline::PipelineCoordinator;
use langforge::progress;
use langforge::translation_engine::TranslationEngine;
use langforge::job_store::JobStore;
use langforge::chunk_store::ChunkStore;
use async_trait::async_trait;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// A scripted `LLMClient` that always returns one fixed translation per
/// request, standing in for a real Ollama/cloud transport in these tests.
struct ScriptedLLMClient {
    translation: String,
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn chat(&self, _model: &str, messages: &[ChatMessage], _timeout: Duration) -> langforge::Result<String> {
        let user = &messages.last().expect("at least one message").content;
        let request: serde_json::Value = serde_json::from_str(user).expect("batch prompt is JSON");
        let items = request["items"].as_array().expect("items array");
        let reply_items: Vec<serde_json::Value> = items
            .iter()
            .map(|item| serde_json::json!({ "id": item["id"], "translation": self.translation }))
            .collect();
        Ok(serde_json::json!({ "items": reply_items }).to_string())
    }
}

#[tokio::test]
async fn pipeline_run_produces_batched_html_with_translated_content() {
    let dir = tempfile::tempdir().unwrap();
    let progress = progress::shared(0);

    let transport: Arc<dyn LLMClient> = Arc::new(ScriptedLLMClient { translation: "Bonjour le monde".to_string() });
    let llm = Some(Arc::new(LLMBatchClient::new(transport, "test-model".to_string())));

    let translation_engine = Arc::new(TranslationEngine::new(
        TranslationProvider::Llm,
        llm,
        None,
        None,
        None,
        2,
        progress.clone(),
        false,
    ));
    let media_engine = Arc::new(MediaEngine::new(None, "en".to_string(), false, AudioOptions::default(), progress.clone()));
    let writer = Arc::new(HtmlBatchWriter::new(dir.path().to_path_buf(), true, false));
    let exporter = Arc::new(BatchExporter::new(writer, 2));
    let coordinator = PipelineCoordinator::new(translation_engine, media_engine, exporter, progress, 2, 8);

    let sentences = vec![
        Sentence { index: 0, number: 1, text: "Hello there, friend.".to_string() },
        Sentence { index: 1, number: 2, text: "Goodbye for now.".to_string() },
    ];
    let targets = vec!["fr".to_string(), "fr".to_string()];
    let stop = Arc::new(AtomicBool::new(false));

    let stats = coordinator.run(sentences, "en".to_string(), targets, stop).await;
    assert_eq!(stats.total_sentences, 2);
    assert_eq!(stats.snapshot.completed_media, 2);

    let mut html_files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().filter_map(|e| e.ok()).collect();
    html_files.sort_by_key(|e| e.file_name());
    assert_eq!(html_files.len(), 1);
    let contents = std::fs::read_to_string(html_files[0].path()).unwrap();
    assert!(contents.contains("Bonjour le monde"));
    assert!(contents.contains("Hello there, friend."));
}

#[tokio::test]
async fn job_and_chunk_stores_persist_a_completed_run() {
    let job_dir = tempfile::tempdir().unwrap();
    let chunk_dir = tempfile::tempdir().unwrap();

    let job_store = JobStore::new(job_dir.path());
    let chunk_store = ChunkStore::new(chunk_dir.path());

    let job = Job {
        job_id: "job-1".to_string(),
        job_type: JobType::Pipeline,
        status: JobStatus::Running,
        request_payload: serde_json::json!({"input": "book.txt"}),
        resume_context: serde_json::json!({}),
        result_payload: serde_json::json!({}),
        owner_user_id: "alice".to_string(),
        owner_role: OwnerRole::User,
        created_at: chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().into(),
        updated_at: chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().into(),
    };
    job_store.create(&job).unwrap();

    let chunk = Chunk {
        chunk_id: "c0".to_string(),
        range_fragment: "0001-0002".to_string(),
        start_sentence: 1,
        end_sentence: 2,
        sentence_count: 2,
        sentences: vec![
            ChunkSentence { number: 1, source: "Hello there.".to_string(), translation: "Bonjour.".to_string(), transliteration: None },
            ChunkSentence { number: 2, source: "Goodbye.".to_string(), translation: "Au revoir.".to_string(), transliteration: None },
        ],
        audio_tracks: None,
        timing_tracks: None,
        highlighting_policy: Some("exact".to_string()),
    };
    let pointers = chunk_store.write_chunks(&[chunk], None).unwrap();
    assert_eq!(pointers.len(), 1);

    let completed = job_store
        .mutate("job-1", |mut j| {
            j.status = JobStatus::Completed;
            j.result_payload = serde_json::json!({ "chunks": pointers.len() });
            j
        })
        .unwrap();

    let fetched = job_store.get("job-1", "alice", OwnerRole::User).unwrap();
    assert_eq!(fetched.status, JobStatus::Completed);
    assert_eq!(fetched.result_payload, completed.result_payload);
    assert_eq!(chunk_store.resolve_highlighting_policy().as_deref(), Some("exact"));
}
