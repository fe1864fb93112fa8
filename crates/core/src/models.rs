use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of extracted document text. Page numbers are 1-based.
#[derive(Debug, Clone)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

/// An overlapping passage of normalized page text. Ids are assigned at
/// assembly time so passages from several pages never collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub content: String,
    pub source: String,
    pub location: u32,
}

/// Row-aligned metadata persisted beside the vector artifact: the record at
/// position `i` describes the vector at position `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: usize,
    pub source: String,
    pub location: u32,
    pub text: String,
}

/// An index record plus its squared Euclidean distance to the query vector.
/// Lower scores are closer.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub record: IndexRecord,
    pub score: f32,
}

/// Inbound request shape: one document reference plus ordered questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRequest {
    pub documents: String,
    pub questions: Vec<String>,
}

/// Outbound response shape: one answer per question, same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResponse {
    pub answers: Vec<String>,
}

/// Descriptive record of what the persisted index was built from. Written
/// beside the artifact pair; queries never depend on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub document_id: String,
    pub source: String,
    pub chunk_count: usize,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_round_trips() {
        let raw = r#"{"documents":"policy.pdf","questions":["What is covered?","What is excluded?"]}"#;
        let request: QaRequest = serde_json::from_str(raw).expect("request should parse");

        assert_eq!(request.documents, "policy.pdf");
        assert_eq!(request.questions.len(), 2);

        let response = QaResponse {
            answers: vec!["a1".to_string(), "a2".to_string()],
        };
        let encoded = serde_json::to_string(&response).expect("response should encode");
        assert_eq!(encoded, r#"{"answers":["a1","a2"]}"#);
    }
}
