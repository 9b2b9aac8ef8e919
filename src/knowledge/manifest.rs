use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::vector_index::VectorIndex;

pub const MANIFEST_VERSION: u32 = 1;

/// Commit record for a knowledge base
///
/// Written after the chunk store and vector index. Its checksum covers both files, so a
/// knowledge base whose files were written by different ingestion runs fails verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub chunk_count: usize,
    pub embedding_dimension: usize,
    pub model_id: String,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Manifest {
    #[inline]
    pub fn new(
        chunk_bytes: &[u8],
        index_bytes: &[u8],
        index: &VectorIndex,
        model_id: &str,
        source: Option<&str>,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION,
            chunk_count: index.len(),
            embedding_dimension: index.dimension(),
            model_id: model_id.to_string(),
            checksum: checksum(chunk_bytes, index_bytes),
            created_at: Utc::now(),
            source: source.map(str::to_string),
        }
    }

    /// Check the persisted bytes against this manifest, returning the mismatch as text
    #[inline]
    pub fn verify_bytes(&self, chunk_bytes: &[u8], index_bytes: &[u8]) -> Result<(), String> {
        if self.version != MANIFEST_VERSION {
            return Err(format!(
                "unsupported manifest version {} (expected {})",
                self.version, MANIFEST_VERSION
            ));
        }

        if checksum(chunk_bytes, index_bytes) != self.checksum {
            return Err(
                "chunk store and vector index do not match the manifest checksum".to_string(),
            );
        }

        Ok(())
    }

    /// Check decoded contents against the recorded counts
    #[inline]
    pub fn verify_contents(&self, chunk_count: usize, index: &VectorIndex) -> Result<(), String> {
        if chunk_count != self.chunk_count || index.len() != self.chunk_count {
            return Err(format!(
                "manifest records {} chunks but found {} chunks and {} vectors",
                self.chunk_count,
                chunk_count,
                index.len()
            ));
        }

        if index.dimension() != self.embedding_dimension {
            return Err(format!(
                "manifest records dimension {} but index has dimension {}",
                self.embedding_dimension,
                index.dimension()
            ));
        }

        Ok(())
    }
}

/// Hex SHA-256 over the chunk store bytes followed by the index bytes
#[inline]
pub fn checksum(chunk_bytes: &[u8], index_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk_bytes);
    hasher.update(index_bytes);
    hex::encode(hasher.finalize())
}
