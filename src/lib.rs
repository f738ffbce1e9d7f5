pub mod batch_exporter;
pub mod chunk_store;
pub mod config;
pub mod context;
pub mod error;
pub mod google_translate;
pub mod job_store;
pub mod language;
pub mod llm;
pub mod media;
pub mod metadata;
pub mod model;
pub mod ollama;
pub mod output_writer;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod sentence_source;
pub mod text;
pub mod transliterate;
pub mod translation_engine;
pub mod validation;
pub mod worker_pool;

pub use config::RuntimeConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{print_summary, PipelineCoordinator, PipelineStats};
