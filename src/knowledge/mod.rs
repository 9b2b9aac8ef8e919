// Knowledge base module
// Persists chunk text, the vector index over it, and the manifest that ties the two together


pub mod chunk_store;
pub mod manifest;
pub mod vector_index;

use anyhow::Context;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::{RagError, Result};

pub use chunk_store::{Chunk, ChunkStore};
pub use manifest::Manifest;
pub use vector_index::{SearchHit, VectorIndex};

/// Chunk store, vector index, and manifest locations for one knowledge base
#[derive(Debug, Clone)]
pub struct KnowledgeBaseStore {
    chunks: ChunkStore,
    index_path: PathBuf,
    manifest_path: PathBuf,
}

/// A verified, fully loaded knowledge base
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    chunks: Vec<String>,
    index: VectorIndex,
    manifest: Manifest,
}

impl KnowledgeBaseStore {
    #[inline]
    pub fn new(
        chunks_path: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chunks: ChunkStore::new(chunks_path),
            index_path: index_path.into(),
            manifest_path: manifest_path.into(),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.chunks_path(),
            config.index_path(),
            config.manifest_path(),
        )
    }

    #[inline]
    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunks
    }

    #[inline]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    #[inline]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Whether all knowledge base files are present, without verifying them
    #[inline]
    pub fn exists(&self) -> bool {
        self.chunks.exists() && self.index_path.is_file() && self.manifest_path.is_file()
    }

    /// Replace the whole knowledge base
    ///
    /// Everything is encoded before the first write. Files are then written one at a time,
    /// each atomically, with the manifest last.
    #[inline]
    pub fn replace(
        &self,
        chunks: &[String],
        index: &VectorIndex,
        model_id: &str,
        source: Option<&str>,
    ) -> Result<Manifest> {
        if chunks.len() != index.len() {
            return Err(RagError::Other(anyhow::anyhow!(
                "Cannot store {} chunks with {} vectors",
                chunks.len(),
                index.len()
            )));
        }

        let chunk_bytes = ChunkStore::encode(chunks)?;
        let index_bytes = index.to_bytes();
        let manifest = Manifest::new(&chunk_bytes, &index_bytes, index, model_id, source);
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .context("Failed to encode manifest")
            .map_err(RagError::Other)?;

        // Nothing is renamed into place until all three files are staged
        let staged_chunks = self.chunks.stage(&chunk_bytes)?;
        let staged_index = StagedWrite::new(&self.index_path, &index_bytes)?;
        let staged_manifest = StagedWrite::new(&self.manifest_path, &manifest_bytes)?;

        staged_chunks.commit()?;
        staged_index.commit()?;
        debug!("Wrote vector index to {}", self.index_path.display());
        staged_manifest.commit()?;

        info!(
            "Stored knowledge base with {} chunks ({} dimensions, model {})",
            manifest.chunk_count, manifest.embedding_dimension, manifest.model_id
        );
        Ok(manifest)
    }

    #[inline]
    pub fn read_manifest(&self) -> Result<Manifest> {
        let bytes = read_required(&self.manifest_path)?;
        serde_json::from_slice(&bytes).map_err(|e| missing(format!("manifest is malformed: {e}")))
    }

    /// Load and verify the knowledge base
    ///
    /// Absent, malformed, or mutually inconsistent files all report
    /// [`RagError::KnowledgeBaseMissing`].
    #[inline]
    pub fn load(&self) -> Result<KnowledgeBase> {
        let manifest = self.read_manifest()?;
        let chunk_bytes = self.chunks.read_bytes()?;
        let index_bytes = read_required(&self.index_path)?;

        manifest
            .verify_bytes(&chunk_bytes, &index_bytes)
            .map_err(missing)?;

        let chunks = ChunkStore::decode(&chunk_bytes)?;
        let index = VectorIndex::from_bytes(&index_bytes)
            .map_err(|e| missing(format!("vector index is malformed: {e:#}")))?;

        manifest
            .verify_contents(chunks.len(), &index)
            .map_err(missing)?;

        debug!(
            "Loaded knowledge base with {} chunks from {}",
            chunks.len(),
            self.chunks.path().display()
        );

        Ok(KnowledgeBase {
            chunks,
            index,
            manifest,
        })
    }
}

impl KnowledgeBase {
    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    #[inline]
    pub fn chunk(&self, id: usize) -> Option<Chunk> {
        self.chunks.get(id).map(|text| Chunk {
            id,
            text: text.clone(),
            source_page: id + 1,
        })
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

pub(crate) fn missing(reason: impl Into<String>) -> RagError {
    RagError::KnowledgeBaseMissing(reason.into())
}

fn read_required(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => missing(format!("{} does not exist", path.display())),
        _ => RagError::Io(e),
    })
}

/// Write `bytes` to a sibling temp file and rename it over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    StagedWrite::stage(path, bytes)?.persist()
}

/// Fully written and synced temp file waiting to be renamed over its target
#[derive(Debug)]
pub(crate) struct StagedWrite {
    temp: tempfile::NamedTempFile,
    path: PathBuf,
}

impl StagedWrite {
    pub(crate) fn new(path: &Path, bytes: &[u8]) -> Result<Self> {
        Self::stage(path, bytes).map_err(RagError::Other)
    }

    fn stage(path: &Path, bytes: &[u8]) -> anyhow::Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        temp.write_all(bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync {}", path.display()))?;

        Ok(Self {
            temp,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn commit(self) -> Result<()> {
        self.persist().map_err(RagError::Other)
    }

    fn persist(self) -> anyhow::Result<()> {
        let Self { temp, path } = self;
        temp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}
