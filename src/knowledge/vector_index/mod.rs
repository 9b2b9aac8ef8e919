#[cfg(test)]
mod tests;

use anyhow::{Context, Result, bail, ensure};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tracing::debug;

const MAGIC: &[u8; 4] = b"DQVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Flat nearest-neighbour index over chunk embeddings
///
/// Row `i` holds the embedding of chunk `i`. The index is always built in one pass from the
/// full ordered embedding list and never updated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

/// One search result, `distance` is the squared Euclidean distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub chunk_id: usize,
    pub distance: f32,
}

impl VectorIndex {
    #[inline]
    pub fn build(embeddings: &[Vec<f32>]) -> Result<Self> {
        let Some(first) = embeddings.first() else {
            return Ok(Self {
                dimension: 0,
                vectors: Vec::new(),
            });
        };

        let dimension = first.len();
        ensure!(dimension > 0, "Embeddings must have at least one dimension");

        let mut vectors = Vec::with_capacity(dimension * embeddings.len());
        for (id, embedding) in embeddings.iter().enumerate() {
            ensure!(
                embedding.len() == dimension,
                "Embedding {} has {} dimensions, expected {}",
                id,
                embedding.len(),
                dimension
            );
            vectors.extend_from_slice(embedding);
        }

        debug!(
            "Built flat index with {} vectors of dimension {}",
            embeddings.len(),
            dimension
        );

        Ok(Self { dimension, vectors })
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding stored for `chunk_id`
    #[inline]
    pub fn vector(&self, chunk_id: usize) -> Option<&[f32]> {
        if chunk_id >= self.len() {
            return None;
        }
        let start = chunk_id * self.dimension;
        self.vectors.get(start..start + self.dimension)
    }

    /// The `k` nearest vectors to `query`, nearest first, ties broken by lower chunk id
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        ensure!(
            query.len() == self.dimension,
            "Query has {} dimensions but the index holds {}-dimensional vectors",
            query.len(),
            self.dimension
        );

        let mut hits: Vec<SearchHit> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(chunk_id, vector)| SearchHit {
                chunk_id,
                distance: squared_l2(vector, query),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_unstable_by(compare_hits);

        Ok(hits)
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.vectors {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() >= HEADER_LEN, "Index file is truncated");
        ensure!(bytes.get(0..4) == Some(MAGIC.as_slice()), "Not a vector index file");

        let version = read_u32(bytes, 4)?;
        if version != FORMAT_VERSION {
            bail!("Unsupported index format version {}", version);
        }

        let dimension = read_u32(bytes, 8)? as usize;
        let count = usize::try_from(read_u64(bytes, 12)?).context("Index count overflows")?;
        ensure!(
            dimension > 0 || count == 0,
            "Index declares {} vectors with zero dimensions",
            count
        );

        let expected = count
            .checked_mul(dimension)
            .and_then(|values| values.checked_mul(4))
            .and_then(|payload| payload.checked_add(HEADER_LEN))
            .context("Index size overflows")?;
        ensure!(
            bytes.len() == expected,
            "Index file holds {} bytes, expected {} for {} vectors of dimension {}",
            bytes.len(),
            expected,
            count,
            dimension
        );

        let vectors = bytes
            .get(HEADER_LEN..)
            .unwrap_or_default()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            dimension: if count == 0 { 0 } else { dimension },
            vectors,
        })
    }

    /// Atomically write the index to `path`
    #[inline]
    pub fn persist(&self, path: &Path) -> Result<()> {
        super::write_atomic(path, &self.to_bytes())
            .with_context(|| format!("Failed to write vector index to {}", path.display()))
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read vector index from {}", path.display()))?;
        Self::from_bytes(&bytes)
    }
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.chunk_id.cmp(&b.chunk_id))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let raw = bytes
        .get(offset..offset + 4)
        .context("Index header is truncated")?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_u64(bytes: &[u8], offset: usize) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .get(offset..offset + 8)
        .context("Index header is truncated")?
        .try_into()
        .context("Index header is truncated")?;
    Ok(u64::from_le_bytes(raw))
}
