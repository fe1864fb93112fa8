use tracing::{info, warn};

use crate::answer::{answer_question, CompletionProvider, GenerationConfig, UNAVAILABLE_ANSWER};
use crate::chunking::{assemble_chunks, ChunkingConfig};
use crate::config::PipelineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{IndexError, PipelineError};
use crate::extractor::TextExtractor;
use crate::index::FlatIndex;
use crate::models::QaResponse;
use crate::retrieve::Retriever;

/// End-to-end pipeline for one document: extraction, chunking, a full index
/// rebuild, then one retrieval-grounded answer per question. Generic over
/// the three external capabilities so the whole flow runs against
/// deterministic stand-ins in tests.
pub struct QaPipeline<X, E, C>
where
    X: TextExtractor,
    E: EmbeddingProvider,
    C: CompletionProvider,
{
    extractor: X,
    embedder: E,
    completion: C,
    index: FlatIndex,
    chunking: ChunkingConfig,
    top_k: usize,
    generation: GenerationConfig,
}

impl<X, E, C> QaPipeline<X, E, C>
where
    X: TextExtractor + Send + Sync,
    E: EmbeddingProvider + Send + Sync,
    C: CompletionProvider + Send + Sync,
{
    pub fn new(config: &PipelineConfig, extractor: X, embedder: E, completion: C) -> Self {
        Self {
            extractor,
            embedder,
            completion,
            index: FlatIndex::from_config(config),
            chunking: ChunkingConfig::from(config),
            top_k: config.top_k,
            generation: GenerationConfig::default(),
        }
    }

    /// Runs the whole pipeline for one document. Answers come back in
    /// question order, one per question. Extraction and index-build failures
    /// abort the run; a single question's upstream failure degrades to the
    /// placeholder answer so its siblings survive. An empty question list
    /// still extracts and indexes, then returns an empty answer list.
    pub async fn run(
        &self,
        document_ref: &str,
        questions: &[String],
    ) -> Result<QaResponse, PipelineError> {
        let pages = self.extractor.extract(document_ref)?;
        info!(
            document = document_ref,
            pages = pages.len(),
            "extracted document text"
        );

        let chunks = assemble_chunks(&pages, document_ref, self.chunking);
        if chunks.is_empty() {
            return Err(PipelineError::Index(IndexError::EmptyBuild));
        }
        self.index
            .build(&self.embedder, document_ref, &chunks)
            .await?;

        let retriever = Retriever::new(&self.index, &self.embedder);
        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            answers.push(self.answer_one(&retriever, question).await);
        }

        Ok(QaResponse { answers })
    }

    async fn answer_one(&self, retriever: &Retriever<'_, E>, question: &str) -> String {
        let passages = match retriever.retrieve(question, self.top_k).await {
            Ok(passages) => passages,
            Err(error) => {
                warn!(%error, question, "retrieval failed for question");
                return UNAVAILABLE_ANSWER.to_string();
            }
        };

        match answer_question(&self.completion, question, &passages, &self.generation).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, question, "answer generation failed for question");
                UNAVAILABLE_ANSWER.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::CompletionResponse;
    use crate::embeddings::NgramHashEmbedder;
    use crate::error::{AnswerError, ExtractError};
    use crate::models::Page;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeExtractor {
        pages: Vec<Page>,
    }

    impl TextExtractor for FakeExtractor {
        fn extract(&self, document_ref: &str) -> Result<Vec<Page>, ExtractError> {
            if self.pages.is_empty() {
                return Err(ExtractError::NotFound(document_ref.to_string()));
            }
            Ok(self.pages.clone())
        }
    }

    /// Echoes the question back out of the prompt, failing for questions
    /// that contain the word "flaky".
    struct EchoCompletion;

    #[async_trait]
    impl CompletionProvider for EchoCompletion {
        async fn complete(
            &self,
            prompt: &str,
            _config: &GenerationConfig,
        ) -> Result<CompletionResponse, AnswerError> {
            let question = prompt
                .lines()
                .find_map(|line| line.strip_prefix("QUESTION: "))
                .unwrap_or_default();

            if question.contains("flaky") {
                return Err(AnswerError::Upstream {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                });
            }
            Ok(CompletionResponse::Text(format!("echo: {question}")))
        }
    }

    fn test_config(data_dir: &Path) -> PipelineConfig {
        PipelineConfig {
            documents_dir: data_dir.join("documents"),
            data_dir: data_dir.to_path_buf(),
            temp_dir: data_dir.join("temp"),
            embedding_model: "ngram-32".to_string(),
            embedding_endpoint: None,
            embedding_api_key: None,
            embedding_dimensions: 32,
            completion_model: "test-model".to_string(),
            completion_api_key: Some("secret".to_string()),
            chunk_size: 80,
            chunk_overlap: 16,
            top_k: 3,
            fetch_timeout: Duration::from_secs(5),
        }
    }

    fn two_page_extractor() -> FakeExtractor {
        FakeExtractor {
            pages: vec![
                Page {
                    number: 1,
                    text: "The waiting period for pre-existing conditions is thirty days. \
                           Claims require written notice within two weeks."
                        .to_string(),
                },
                Page {
                    number: 2,
                    text: "Maternity cover begins after nine months of continuous enrollment."
                        .to_string(),
                },
            ],
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn answers_preserve_question_order() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let pipeline = QaPipeline::new(
            &config,
            two_page_extractor(),
            NgramHashEmbedder::new(32),
            EchoCompletion,
        );

        let questions = vec![
            "first question".to_string(),
            "second question".to_string(),
            "third question".to_string(),
        ];
        let response = pipeline.run("policy.pdf", &questions).await.expect("run");

        assert_eq!(
            response.answers,
            vec![
                "echo: first question".to_string(),
                "echo: second question".to_string(),
                "echo: third question".to_string(),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_questions_still_index_and_return_an_empty_list() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let pipeline = QaPipeline::new(
            &config,
            two_page_extractor(),
            NgramHashEmbedder::new(32),
            EchoCompletion,
        );

        let response = pipeline.run("policy.pdf", &[]).await.expect("run");

        assert!(response.answers.is_empty());
        assert!(config.vectors_path().exists());
        assert!(config.metadata_path().exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_failing_question_degrades_without_touching_the_others() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let pipeline = QaPipeline::new(
            &config,
            two_page_extractor(),
            NgramHashEmbedder::new(32),
            EchoCompletion,
        );

        let questions = vec![
            "a fine question".to_string(),
            "a flaky question".to_string(),
            "another fine question".to_string(),
        ];
        let response = pipeline.run("policy.pdf", &questions).await.expect("run");

        assert_eq!(response.answers.len(), 3);
        assert_eq!(response.answers[0], "echo: a fine question");
        assert_eq!(response.answers[1], UNAVAILABLE_ANSWER);
        assert_eq!(response.answers[2], "echo: another fine question");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extraction_failures_abort_the_run() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let pipeline = QaPipeline::new(
            &config,
            FakeExtractor { pages: vec![] },
            NgramHashEmbedder::new(32),
            EchoCompletion,
        );

        let result = pipeline.run("missing.pdf", &["q".to_string()]).await;

        assert!(matches!(
            result,
            Err(PipelineError::Extract(ExtractError::NotFound(_)))
        ));
        assert!(!config.vectors_path().exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn whitespace_only_documents_fail_the_build() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let pipeline = QaPipeline::new(
            &config,
            FakeExtractor {
                pages: vec![Page {
                    number: 1,
                    text: "   \n\n   ".to_string(),
                }],
            },
            NgramHashEmbedder::new(32),
            EchoCompletion,
        );

        let result = pipeline.run("blank.pdf", &[]).await;
        assert!(matches!(
            result,
            Err(PipelineError::Index(IndexError::EmptyBuild))
        ));
    }
}
