use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::IndexError;
use crate::models::{Chunk, IndexManifest, IndexRecord, RetrievedPassage};

/// On-disk vector artifact. Opaque to everything outside this module.
#[derive(Debug, Serialize, Deserialize)]
struct StoredVectors {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

/// Flat, rebuild-only similarity index over one document's passages.
///
/// Two artifacts are always written as a pair: a bincode vector blob and a
/// row-aligned JSON metadata array. The metadata record at position `i`
/// describes the vector at position `i`; every query depends on that
/// alignment. There is no incremental insert or delete; `build` always
/// replaces both artifacts.
pub struct FlatIndex {
    vectors_path: PathBuf,
    metadata_path: PathBuf,
    manifest_path: PathBuf,
}

impl FlatIndex {
    pub fn new(vectors_path: PathBuf, metadata_path: PathBuf, manifest_path: PathBuf) -> Self {
        Self {
            vectors_path,
            metadata_path,
            manifest_path,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.vectors_path(),
            config.metadata_path(),
            config.manifest_path(),
        )
    }

    /// Embeds the chunk batch in one provider call and replaces the persisted
    /// artifact pair. The vector blob lands first; metadata is only written
    /// after that succeeds, so a reader never finds metadata describing
    /// vectors that are not there.
    pub async fn build<E>(
        &self,
        provider: &E,
        source: &str,
        chunks: &[Chunk],
    ) -> Result<IndexManifest, IndexError>
    where
        E: EmbeddingProvider + Sync,
    {
        if chunks.is_empty() {
            return Err(IndexError::EmptyBuild);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = provider.dimensions();
        for vector in &vectors {
            if vector.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: vector.len(),
                });
            }
        }

        let records: Vec<IndexRecord> = chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| IndexRecord {
                id: position,
                source: chunk.source.clone(),
                location: chunk.location,
                text: chunk.content.clone(),
            })
            .collect();

        let stored = StoredVectors {
            dimensions,
            vectors,
        };
        write_replacing(&self.vectors_path, &bincode::serialize(&stored)?)?;
        write_replacing(&self.metadata_path, &serde_json::to_vec_pretty(&records)?)?;

        let manifest = IndexManifest {
            document_id: document_id(source),
            source: source.to_string(),
            chunk_count: chunks.len(),
            dimensions,
            built_at: Utc::now(),
        };
        write_replacing(&self.manifest_path, &serde_json::to_vec_pretty(&manifest)?)?;

        info!(chunks = chunks.len(), dimensions, "rebuilt passage index");
        Ok(manifest)
    }

    /// Embeds the query and scans the persisted vectors for the `k` nearest
    /// rows by squared Euclidean distance, best match first. Vectors are
    /// compared as stored; no renormalization is applied.
    pub async fn query<E>(
        &self,
        provider: &E,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, IndexError>
    where
        E: EmbeddingProvider + Sync,
    {
        let (stored, records) = self.load()?;

        let query = provider
            .embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                IndexError::Embedding("provider returned no vector for the query".to_string())
            })?;
        if query.len() != stored.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: stored.dimensions,
                got: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = stored
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, squared_l2(&query, vector)))
            .collect();
        scored.sort_by(|left, right| left.1.total_cmp(&right.1));

        let mut results = Vec::new();
        for (position, score) in scored.into_iter().take(k) {
            // A row without a metadata record means the artifact pair is out
            // of step; skip the row rather than failing the query.
            let Some(record) = records.get(position) else {
                debug!(position, "vector row has no metadata record, skipping");
                continue;
            };
            results.push(RetrievedPassage {
                record: record.clone(),
                score,
            });
        }

        Ok(results)
    }

    fn load(&self) -> Result<(StoredVectors, Vec<IndexRecord>), IndexError> {
        if !self.vectors_path.exists() || !self.metadata_path.exists() {
            return Err(IndexError::NotBuilt(
                self.vectors_path.display().to_string(),
            ));
        }

        let stored: StoredVectors = bincode::deserialize(&fs::read(&self.vectors_path)?)?;
        let records: Vec<IndexRecord> = serde_json::from_slice(&fs::read(&self.metadata_path)?)?;
        Ok((stored, records))
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum()
}

/// Stable identifier for the indexed document reference.
fn document_id(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
