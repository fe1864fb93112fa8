use crate::embeddings::EmbeddingProvider;
use crate::error::IndexError;
use crate::index::FlatIndex;
use crate::models::RetrievedPassage;

/// Ranked-passage lookup for one question. Deliberately nothing beyond the
/// index query: no deduplication and no re-ranking, so a document that
/// repeats text can surface near-duplicate passages.
pub struct Retriever<'a, E> {
    index: &'a FlatIndex,
    provider: &'a E,
}

impl<'a, E> Retriever<'a, E>
where
    E: EmbeddingProvider + Sync,
{
    pub fn new(index: &'a FlatIndex, provider: &'a E) -> Self {
        Self { index, provider }
    }

    pub async fn retrieve(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, IndexError> {
        self.index.query(self.provider, question, k).await
    }
}
