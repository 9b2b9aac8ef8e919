use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{StagedWrite, missing};
use crate::{RagError, Result};

/// A unit of retrievable text, one per document page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the chunk store, equal to the row of its vector
    pub id: usize,
    pub text: String,
    /// 1-based page the text came from
    pub source_page: usize,
}

impl Chunk {
    #[inline]
    pub fn from_texts(texts: &[String]) -> Vec<Self> {
        texts
            .iter()
            .enumerate()
            .map(|(id, text)| Self {
                id,
                text: text.clone(),
                source_page: id + 1,
            })
            .collect()
    }
}

/// Ordered chunk texts persisted as a JSON array
#[derive(Debug, Clone)]
pub struct ChunkStore {
    path: PathBuf,
}

impl ChunkStore {
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    #[inline]
    pub fn encode(chunks: &[String]) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(chunks)
            .map_err(|e| RagError::Other(anyhow::Error::new(e).context("Failed to encode chunks")))
    }

    #[inline]
    pub fn decode(bytes: &[u8]) -> Result<Vec<String>> {
        serde_json::from_slice(bytes).map_err(|e| missing(format!("chunk store is malformed: {e}")))
    }

    /// Replace the stored chunks with `chunks`, in order
    #[inline]
    pub fn write_all(&self, chunks: &[String]) -> Result<()> {
        self.stage(&Self::encode(chunks)?)?.commit()?;
        debug!("Wrote chunk store to {}", self.path.display());
        Ok(())
    }

    /// Temp file holding `bytes`, renamed over the store on commit
    pub(super) fn stage(&self, bytes: &[u8]) -> Result<StagedWrite> {
        StagedWrite::new(&self.path, bytes)
    }

    /// All stored chunks in insertion order
    #[inline]
    pub fn read_all(&self) -> Result<Vec<String>> {
        Self::decode(&self.read_bytes()?)
    }

    pub(super) fn read_bytes(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => missing(format!("{} does not exist", self.path.display())),
            _ => RagError::Io(e),
        })
    }
}
