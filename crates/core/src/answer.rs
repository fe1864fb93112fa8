//! Turns one question plus its retrieved evidence into one grounded answer
//! string. The completion capability is an opaque collaborator that may be
//! slow, nondeterministic, or return data in an unexpected shape; everything
//! here is built so one bad response degrades to a best-effort answer instead
//! of failing the batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::AnswerError;
use crate::models::RetrievedPassage;

/// The exact sentence the model is instructed to answer with when the
/// context does not cover the question. Enforced by prompt only.
pub const FALLBACK_ANSWER: &str = "Not stated in the document.";

/// Placeholder emitted when a single question's retrieval or completion
/// fails after retries; its sibling questions keep their answers.
pub const UNAVAILABLE_ANSWER: &str = "[answer unavailable: upstream error]";

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Sampling settings for the completion call. The defaults favor
/// reproducibility and latency over creativity.
#[derive(Debug, Clone, Copy)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 256,
            temperature: 0.0,
            top_p: 0.95,
        }
    }
}

/// What a completion endpoint actually sent back, classified once at the
/// provider boundary so extraction is an exhaustive match instead of
/// attribute probing.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResponse {
    /// The payload exposed a plain top-level text field.
    Text(String),
    /// The payload used the nested candidate/content/parts structure.
    Candidates(Vec<Candidate>),
    /// Anything else. Kept verbatim so extraction can stringify it.
    Unrecognized(Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

/// Parts arrive either as `{"text": ...}` records or as bare strings,
/// depending on the endpoint revision.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CandidatePart {
    Structured {
        #[serde(default)]
        text: Option<String>,
    },
    Plain(String),
}

/// Maps a raw completion payload onto [`CompletionResponse`]. Anything that
/// is neither a top-level text field nor a parseable candidate list lands in
/// `Unrecognized`.
pub fn classify_response(payload: Value) -> CompletionResponse {
    if let Some(text) = payload.get("text").and_then(Value::as_str) {
        if !text.is_empty() {
            return CompletionResponse::Text(text.to_string());
        }
    }

    if let Some(candidates) = payload.get("candidates") {
        if let Ok(parsed) = serde_json::from_value::<Vec<Candidate>>(candidates.clone()) {
            if !parsed.is_empty() {
                return CompletionResponse::Candidates(parsed);
            }
        }
    }

    CompletionResponse::Unrecognized(payload)
}

/// Best-effort text extraction. Total over every response shape: candidates
/// concatenate their text-bearing parts, unrecognized payloads stringify,
/// and the result is always trimmed. Never fails, never panics.
pub fn extract_text(response: &CompletionResponse) -> String {
    match response {
        CompletionResponse::Text(text) => text.trim().to_string(),
        CompletionResponse::Candidates(candidates) => {
            let mut pieces = Vec::new();
            for candidate in candidates {
                let Some(content) = &candidate.content else {
                    continue;
                };
                for part in &content.parts {
                    match part {
                        CandidatePart::Structured { text: Some(text) } => pieces.push(text.as_str()),
                        CandidatePart::Structured { text: None } => {}
                        CandidatePart::Plain(text) => pieces.push(text.as_str()),
                    }
                }
            }
            pieces.concat().trim().to_string()
        }
        CompletionResponse::Unrecognized(payload) => payload.to_string().trim().to_string(),
    }
}

/// Renders the full prompt for one question: a fixed preamble with the
/// grounding rules, the question, the numbered evidence blocks, and a fixed
/// output-format instruction. Deterministic for a given question and
/// passage list; this string is the entire contract with the completion
/// capability.
pub fn build_prompt(question: &str, passages: &[RetrievedPassage]) -> String {
    let context = passages
        .iter()
        .enumerate()
        .map(|(position, passage)| {
            format!(
                "[{}] Source: {} - Loc: {}\n{}\n",
                position + 1,
                passage.record.source,
                passage.record.location,
                passage.record.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n----\n");

    format!(
        "You are an expert document-analysis assistant. \
Answer the user's question using ONLY the provided context. \
If the context doesn't contain a clear answer, say '{FALLBACK_ANSWER}'\n\
\n\
QUESTION: {question}\n\
\n\
CONTEXT (relevant extracted clauses):\n\
{context}\n\
\n\
INSTRUCTIONS:\n\
 - Provide a concise, single-paragraph answer (1-3 sentences).\n\
 - Do NOT invent facts beyond the context.\n\
 - If the answer is present in the context, prefer quoting clause-level specifics (e.g., 'Clause X on Page Y').\n\
 - Respond ONLY with the answer. Do NOT include 'Answer:' or any extra JSON wrappers.\n"
    )
}

/// External completion capability: one prompt plus sampling settings in, a
/// classified response out.
#[async_trait]
pub trait CompletionProvider {
    async fn complete(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<CompletionResponse, AnswerError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: RequestGenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestGenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

/// Completion provider backed by the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(GEMINI_API_BASE, model, api_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Fails when the credential is absent rather than degrading to a no-op
    /// provider.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AnswerError> {
        let api_key = config
            .completion_api_key
            .clone()
            .ok_or(AnswerError::MissingCredential("GOOGLE_API_KEY"))?;
        Ok(Self::new(config.completion_model.clone(), api_key))
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<CompletionResponse, AnswerError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: RequestGenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AnswerError::Upstream {
                status: response.status(),
            });
        }

        let payload: Value = response.json().await?;
        Ok(classify_response(payload))
    }
}

/// Produces one grounded answer string for one question. A transient
/// transport failure gets a single retry before the error surfaces; a
/// malformed response body is not an error at all and degrades inside
/// [`extract_text`].
pub async fn answer_question<C>(
    provider: &C,
    question: &str,
    passages: &[RetrievedPassage],
    config: &GenerationConfig,
) -> Result<String, AnswerError>
where
    C: CompletionProvider + Sync,
{
    let prompt = build_prompt(question, passages);

    let response = match provider.complete(&prompt, config).await {
        Ok(response) => response,
        Err(AnswerError::Http(error)) if error.is_timeout() || error.is_connect() => {
            warn!(%error, "completion call failed, retrying once");
            provider.complete(&prompt, config).await?
        }
        Err(error) => return Err(error),
    };

    Ok(extract_text(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexRecord;
    use httpmock::prelude::*;
    use serde_json::json;

    fn passage(id: usize, location: u32, text: &str) -> RetrievedPassage {
        RetrievedPassage {
            record: IndexRecord {
                id,
                source: "policy.pdf".to_string(),
                location,
                text: text.to_string(),
            },
            score: id as f32 * 0.1,
        }
    }

    #[test]
    fn prompt_is_deterministic_and_carries_the_grounding_rules() {
        let passages = vec![
            passage(0, 3, "waiting period is thirty days"),
            passage(1, 7, "maternity cover starts after nine months"),
        ];

        let first = build_prompt("What is the waiting period?", &passages);
        let second = build_prompt("What is the waiting period?", &passages);
        assert_eq!(first, second);

        assert!(first.contains("QUESTION: What is the waiting period?"));
        assert!(first.contains(FALLBACK_ANSWER));
        assert!(first.contains("[1] Source: policy.pdf - Loc: 3"));
        assert!(first.contains("[2] Source: policy.pdf - Loc: 7"));
        assert!(first.contains("\n----\n"));
    }

    #[test]
    fn prompt_renders_without_any_passages() {
        let prompt = build_prompt("Anything?", &[]);
        assert!(prompt.contains("QUESTION: Anything?"));
        assert!(prompt.contains("CONTEXT (relevant extracted clauses):"));
    }

    #[test]
    fn top_level_text_field_wins_classification() {
        let response = classify_response(json!({"text": "direct answer"}));
        assert_eq!(response, CompletionResponse::Text("direct answer".to_string()));
        assert_eq!(extract_text(&response), "direct answer");
    }

    #[test]
    fn structured_candidate_parts_concatenate() {
        let response = classify_response(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "first half, "},
                        {"text": "second half."},
                        {"inlineData": {"mimeType": "image/png"}}
                    ]
                }
            }]
        }));

        assert!(matches!(response, CompletionResponse::Candidates(_)));
        assert_eq!(extract_text(&response), "first half, second half.");
    }

    #[test]
    fn plain_string_parts_are_tolerated() {
        let response = classify_response(json!({
            "candidates": [{"content": {"parts": ["just a string part"]}}]
        }));
        assert_eq!(extract_text(&response), "just a string part");
    }

    #[test]
    fn unrecognized_payloads_stringify_instead_of_failing() {
        let response = classify_response(json!({"usageMetadata": {"totalTokens": 12}}));
        assert!(matches!(response, CompletionResponse::Unrecognized(_)));
        assert_eq!(extract_text(&response), r#"{"usageMetadata":{"totalTokens":12}}"#);
    }

    #[test]
    fn degenerate_payloads_never_panic() {
        for payload in [
            json!(null),
            json!({}),
            json!({"text": ""}),
            json!({"candidates": []}),
            json!({"candidates": [{}]}),
            json!({"candidates": [{"content": {}}]}),
            json!({"candidates": "oops"}),
            json!([1, 2, 3]),
        ] {
            let response = classify_response(payload);
            // Extraction must stay total; the value itself is unimportant.
            let _ = extract_text(&response);
        }
    }

    #[test]
    fn extraction_always_trims() {
        let response = CompletionResponse::Text("  padded answer \n".to_string());
        assert_eq!(extract_text(&response), "padded answer");
    }

    #[tokio::test]
    async fn gemini_client_posts_the_prompt_and_classifies_the_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/test-model:generateContent")
                    .query_param("key", "secret")
                    .json_body_partial(r#"{"generationConfig": {"maxOutputTokens": 256}}"#);
                then.status(200).json_body(json!({
                    "candidates": [{"content": {"parts": [{"text": "grounded answer"}]}}]
                }));
            })
            .await;

        let client = GeminiClient::with_base_url(server.base_url(), "test-model", "secret");
        let response = client
            .complete("prompt body", &GenerationConfig::default())
            .await
            .expect("complete");

        mock.assert_async().await;
        assert_eq!(extract_text(&response), "grounded answer");
    }

    #[tokio::test]
    async fn gemini_client_surfaces_failure_statuses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("slow down");
            })
            .await;

        let client = GeminiClient::with_base_url(server.base_url(), "test-model", "secret");
        let result = client.complete("prompt", &GenerationConfig::default()).await;

        assert!(matches!(result, Err(AnswerError::Upstream { status }) if status.as_u16() == 429));
    }

    struct CannedProvider {
        reply: String,
    }

    #[async_trait]
    impl CompletionProvider for CannedProvider {
        async fn complete(
            &self,
            prompt: &str,
            _config: &GenerationConfig,
        ) -> Result<CompletionResponse, AnswerError> {
            assert!(prompt.contains("QUESTION:"));
            Ok(CompletionResponse::Text(self.reply.clone()))
        }
    }

    #[tokio::test]
    async fn answer_question_returns_the_trimmed_extraction() {
        let provider = CannedProvider {
            reply: "  thirty days  ".to_string(),
        };

        let answer = answer_question(
            &provider,
            "What is the waiting period?",
            &[passage(0, 3, "waiting period is thirty days")],
            &GenerationConfig::default(),
        )
        .await
        .expect("answer");

        assert_eq!(answer, "thirty days");
    }
}
