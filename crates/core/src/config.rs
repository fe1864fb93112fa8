//! Environment-sourced pipeline configuration. Every knob has a default; the
//! CLI loads `.env` before calling [`PipelineConfig::from_env`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::embeddings::parse_ngram_dimensions;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "ngram-256";
pub const DEFAULT_COMPLETION_MODEL: &str = "gemini-1.5-flash";

const VECTORS_FILE: &str = "passage_vectors.bin";
const METADATA_FILE: &str = "passage_metadata.json";
const MANIFEST_FILE: &str = "index_manifest.json";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for document references given as plain filenames.
    pub documents_dir: PathBuf,
    /// Directory holding the persisted index artifact pair. Concurrent runs
    /// against one data dir race; give each deployment its own.
    pub data_dir: PathBuf,
    /// Scratch directory for downloaded remote documents.
    pub temp_dir: PathBuf,
    pub embedding_model: String,
    pub embedding_endpoint: Option<String>,
    pub embedding_api_key: Option<String>,
    /// Vector width reported by a remote embedding endpoint. Ignored for
    /// `ngram-<dims>` models, which carry their width in the model id.
    pub embedding_dimensions: usize,
    pub completion_model: String,
    pub completion_api_key: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub fetch_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunk_size = env_usize("CHUNK_SIZE", 1_000)?;
        let chunk_overlap = env_usize("CHUNK_OVERLAP", 200)?;
        validate_chunking(chunk_size, chunk_overlap)?;

        let config = Self {
            documents_dir: env_path("PDF_QA_DOCUMENTS_DIR", "data/documents"),
            data_dir: env_path("PDF_QA_DATA_DIR", "data/processed"),
            temp_dir: env_path("PDF_QA_TEMP_DIR", "data/temp"),
            embedding_model: env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_endpoint: env_opt("EMBEDDING_ENDPOINT"),
            embedding_api_key: env_opt("EMBEDDING_API_KEY"),
            embedding_dimensions: env_usize("EMBEDDING_DIMENSIONS", 384)?,
            completion_model: env_or("GEMINI_MODEL", DEFAULT_COMPLETION_MODEL),
            completion_api_key: env_opt("GOOGLE_API_KEY"),
            chunk_size,
            chunk_overlap,
            top_k: env_usize("RETRIEVE_TOP_K", 6)?,
            fetch_timeout: Duration::from_secs(env_usize("FETCH_TIMEOUT_SECS", 30)? as u64),
        };

        if config.embedding_endpoint.is_none() {
            parse_ngram_dimensions(&config.embedding_model)?;
        }

        Ok(config)
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.data_dir.join(VECTORS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join(MANIFEST_FILE)
    }
}

pub fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<(), ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::InvalidVar {
            name: "CHUNK_SIZE",
            reason: "must be positive".to_string(),
        });
    }
    if chunk_overlap >= chunk_size {
        return Err(ConfigError::InvalidVar {
            name: "CHUNK_OVERLAP",
            reason: format!("must be smaller than CHUNK_SIZE ({chunk_overlap} >= {chunk_size})"),
        });
    }
    Ok(())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_path(name: &str, default: &str) -> PathBuf {
    PathBuf::from(env_or(name, default))
}

fn env_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env_opt(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
            name,
            reason: format!("expected an integer, got `{raw}`"),
        }),
    }
}
