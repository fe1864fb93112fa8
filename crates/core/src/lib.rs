pub mod answer;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod retrieve;

pub use answer::{
    answer_question, build_prompt, classify_response, extract_text, CompletionProvider,
    CompletionResponse, GeminiClient, GenerationConfig, FALLBACK_ANSWER, UNAVAILABLE_ANSWER,
};
pub use chunking::{assemble_chunks, split_into_windows, ChunkingConfig};
pub use config::{PipelineConfig, DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_MODEL};
pub use embeddings::{
    parse_ngram_dimensions, ConfiguredEmbedder, EmbeddingProvider, HttpEmbedder, NgramHashEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{AnswerError, ConfigError, ExtractError, IndexError, PipelineError};
pub use extractor::{available_documents, extract_page_texts, PdfTextExtractor, TextExtractor};
pub use index::FlatIndex;
pub use models::{
    Chunk, IndexManifest, IndexRecord, Page, QaRequest, QaResponse, RetrievedPassage,
};
pub use normalize::clean_text;
pub use pipeline::QaPipeline;
pub use retrieve::Retriever;
