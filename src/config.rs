use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    #[default]
    Llm,
    Googletrans,
}

impl std::str::FromStr for TranslationProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(TranslationProvider::Llm),
            "google" | "googletrans" => Ok(TranslationProvider::Googletrans),
            _ => Err(format!("unknown translation provider: {s}")),
        }
    }
}

/// Runtime configuration recognized by the engine, per the external-config
/// contract. Values are layered file -> env -> vault, each overriding the
/// previous.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub working_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub tmp_dir: Option<PathBuf>,
    pub books_dir: Option<PathBuf>,

    pub ollama_url: String,
    pub ollama_model: String,

    pub thread_count: usize,
    pub queue_size: usize,
    pub pipeline_mode: bool,
    pub use_ramdisk: bool,

    pub translation_provider: TranslationProvider,
    pub batch_size: Option<usize>,
    pub sentences_per_output_file: usize,
    pub include_transliteration: bool,

    pub generate_audio: bool,
    pub generate_video: bool,
    pub output_html: bool,
    pub output_pdf: bool,

    pub job_max_workers: usize,

    pub metadata_cache_enabled: bool,
    pub metadata_cache_dir: PathBuf,
    pub metadata_cache_ttl_hours: i64,

    #[serde(skip)]
    pub llm_api_key: Option<String>,
    #[serde(skip)]
    pub tmdb_api_key: Option<String>,
    #[serde(skip)]
    pub omdb_api_key: Option<String>,
    #[serde(skip)]
    pub google_books_api_key: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            output_dir: None,
            tmp_dir: None,
            books_dir: None,
            ollama_url: "http://localhost:11434/api/chat".to_string(),
            ollama_model: "gemma2:27b".to_string(),
            thread_count: 5,
            queue_size: 20,
            pipeline_mode: false,
            use_ramdisk: true,
            translation_provider: TranslationProvider::Llm,
            batch_size: None,
            sentences_per_output_file: 10,
            include_transliteration: false,
            generate_audio: true,
            generate_video: true,
            output_html: true,
            output_pdf: false,
            job_max_workers: 2,
            metadata_cache_enabled: true,
            metadata_cache_dir: PathBuf::from(".metadata_cache"),
            metadata_cache_ttl_hours: 168,
            llm_api_key: None,
            tmdb_api_key: None,
            omdb_api_key: None,
            google_books_api_key: None,
        }
    }
}

impl RuntimeConfig {
    /// Loads config file, then environment overrides, then vault secrets, in
    /// that order.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::config_file_path() {
            if path.exists() {
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            }
        }

        Self::load_dotenv_files();
        config.apply_env_overrides();
        config.apply_vault_secrets()?;

        Ok(config)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("langforge").join("config.toml"))
    }

    /// Search order: `EBOOK_ENV_FILE` (explicit path), `.env.<EBOOK_ENV>`,
    /// `.env.local`, `.env`. The first file found is loaded; later candidates
    /// are not merged on top.
    fn load_dotenv_files() {
        for path in Self::candidate_env_files() {
            if path.exists() {
                Self::apply_dotenv_file(&path);
                break;
            }
        }
    }

    fn candidate_env_files() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(explicit) = std::env::var("EBOOK_ENV_FILE") {
            candidates.push(PathBuf::from(explicit));
        }
        if let Ok(target) = std::env::var("EBOOK_ENV") {
            candidates.push(PathBuf::from(format!(".env.{target}")));
        }
        candidates.push(PathBuf::from(".env.local"));
        candidates.push(PathBuf::from(".env"));
        candidates
    }

    fn apply_dotenv_file(path: &std::path::Path) {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return;
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("EBOOK_WORKING_DIR") {
            self.working_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("EBOOK_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("EBOOK_TMP_DIR") {
            self.tmp_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("EBOOK_BOOKS_DIR") {
            self.books_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("EBOOK_OLLAMA_URL") {
            self.ollama_url = v;
        }
        if let Ok(v) = std::env::var("EBOOK_OLLAMA_MODEL") {
            self.ollama_model = v;
        }
        if let Ok(v) = std::env::var("EBOOK_THREAD_COUNT") {
            if let Ok(n) = v.parse() {
                self.thread_count = n;
            }
        }
        if let Ok(v) = std::env::var("EBOOK_QUEUE_SIZE") {
            if let Ok(n) = v.parse() {
                self.queue_size = n;
            }
        }
        if let Ok(v) = std::env::var("EBOOK_PIPELINE_MODE") {
            self.pipeline_mode = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("EBOOK_USE_RAMDISK") {
            self.use_ramdisk = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("EBOOK_TRANSLATION_PROVIDER") {
            if let Ok(p) = v.parse() {
                self.translation_provider = p;
            }
        }
        if let Ok(v) = std::env::var("EBOOK_BATCH_SIZE") {
            self.batch_size = v.parse().ok();
        }
        if let Ok(v) = std::env::var("EBOOK_JOB_MAX_WORKERS") {
            if let Ok(n) = v.parse() {
                self.job_max_workers = n;
            }
        }
        if let Ok(v) = std::env::var("EBOOK_METADATA_CACHE_ENABLED") {
            self.metadata_cache_enabled = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("EBOOK_METADATA_CACHE_DIR") {
            self.metadata_cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("EBOOK_METADATA_CACHE_TTL_HOURS") {
            if let Ok(n) = v.parse() {
                self.metadata_cache_ttl_hours = n;
            }
        }
        if let Ok(v) = std::env::var("EBOOK_API_KEY_TMDB") {
            self.tmdb_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("EBOOK_API_KEY_OMDB") {
            self.omdb_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("EBOOK_API_KEY_GOOGLE_BOOKS") {
            self.google_books_api_key = Some(v);
        }
    }

    /// Secrets stay out of the main config file; `EBOOK_VAULT_FILE` points at
    /// a JSON document with recognized secret keys.
    fn apply_vault_secrets(&mut self) -> Result<()> {
        let Ok(path) = std::env::var("EBOOK_VAULT_FILE") else {
            return Ok(());
        };
        let contents = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        if let Some(key) = value.get("llm_api_key").and_then(|v| v.as_str()) {
            self.llm_api_key = Some(key.to_string());
        }
        if let Some(key) = value.get("tmdb_api_key").and_then(|v| v.as_str()) {
            self.tmdb_api_key = Some(key.to_string());
        }
        if let Some(key) = value.get("omdb_api_key").and_then(|v| v.as_str()) {
            self.omdb_api_key = Some(key.to_string());
        }
        if let Some(key) = value.get("google_books_api_key").and_then(|v| v.as_str()) {
            self.google_books_api_key = Some(key.to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_count == 0 {
            return Err(PipelineError::ConfigInvalid(
                "thread_count must be greater than 0".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(PipelineError::ConfigInvalid(
                "queue_size must be greater than 0".to_string(),
            ));
        }
        if matches!(self.translation_provider, TranslationProvider::Llm)
            && self.ollama_url.is_empty()
        {
            return Err(PipelineError::ConfigInvalid(
                "ollama_url must be set when translation_provider is llm".to_string(),
            ));
        }
        Ok(())
    }

    /// `batch_size < 2` disables LLM batch mode and forces one call per
    /// sentence.
    pub fn normalized_batch_size(&self) -> Option<usize> {
        self.batch_size.filter(|&n| n >= 2)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RuntimeConfig::default();
        assert_eq!(config.ollama_model, "gemma2:27b");
        assert_eq!(config.thread_count, 5);
        assert_eq!(config.queue_size, 20);
        assert!(!config.pipeline_mode);
        assert!(config.use_ramdisk);
        assert_eq!(config.sentences_per_output_file, 10);
        assert_eq!(config.job_max_workers, 2);
    }

    #[test]
    fn batch_size_below_two_disables_batching() {
        let mut config = RuntimeConfig::default();
        config.batch_size = Some(1);
        assert_eq!(config.normalized_batch_size(), None);
        config.batch_size = Some(8);
        assert_eq!(config.normalized_batch_size(), Some(8));
    }

    #[test]
    fn validate_rejects_zero_thread_count() {
        let mut config = RuntimeConfig::default();
        config.thread_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn provider_parses_from_string() {
        assert_eq!(
            "llm".parse::<TranslationProvider>().unwrap(),
            TranslationProvider::Llm
        );
        assert_eq!(
            "google".parse::<TranslationProvider>().unwrap(),
            TranslationProvider::Googletrans
        );
        assert!("nonsense".parse::<TranslationProvider>().is_err());
    }

    #[test]
    fn round_trip_through_toml_preserves_recognized_keys() {
        let config = RuntimeConfig {
            ollama_model: "custom-model".to_string(),
            thread_count: 9,
            ..RuntimeConfig::default()
        };
        let serialized = toml::to_string(&config).unwrap();
        let reloaded: RuntimeConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reloaded.ollama_model, "custom-model");
        assert_eq!(reloaded.thread_count, 9);
    }
}
