use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("document fetch returned {status} for {url}")]
    FetchStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("pdf parse error: {0}")]
    PdfParse(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no persisted index at {0}; build one first")]
    NotBuilt(String),

    #[error("refusing to build an index from zero chunks")]
    EmptyBuild,

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector artifact codec error: {0}")]
    VectorCodec(#[from] bincode::Error),

    #[error("metadata codec error: {0}")]
    MetadataCodec(#[from] serde_json::Error),

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion endpoint returned {status}")]
    Upstream { status: reqwest::StatusCode },

    #[error("completion credential missing: set {0}")]
    MissingCredential(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    InvalidVar {
        name: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
