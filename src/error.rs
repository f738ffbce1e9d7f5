use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("LLM transport error: {0}")]
    LLMTransport(String),

    #[error("LLM validation rejected: {0}")]
    LLMValidation(String),

    #[error("cover image missing: {0}")]
    CoverMissing(String),

    #[error("cancelled")]
    Cancelled,

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
