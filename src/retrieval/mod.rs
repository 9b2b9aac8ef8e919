// Retrieval module
// Embeds a query and maps the nearest index rows back to chunk text


use tracing::{debug, warn};

use crate::embeddings::EmbeddingEncoder;
use crate::knowledge::{KnowledgeBase, KnowledgeBaseStore};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 3;

/// A chunk returned for a query, in rank order
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: usize,
    pub text: String,
    pub distance: f32,
}

impl RetrievedChunk {
    #[inline]
    pub fn source_page(&self) -> usize {
        self.id + 1
    }
}

/// Answers nearest-chunk queries against a persisted knowledge base
///
/// The knowledge base is loaded on the first query and kept for the lifetime of the retriever.
pub struct Retriever<'a> {
    encoder: &'a EmbeddingEncoder,
    store: &'a KnowledgeBaseStore,
    knowledge_base: Option<KnowledgeBase>,
}

impl<'a> Retriever<'a> {
    #[inline]
    pub fn new(encoder: &'a EmbeddingEncoder, store: &'a KnowledgeBaseStore) -> Self {
        Self {
            encoder,
            store,
            knowledge_base: None,
        }
    }

    /// The loaded knowledge base, loading and verifying it on first use
    #[inline]
    pub fn knowledge_base(&mut self) -> Result<&KnowledgeBase> {
        let knowledge_base = match self.knowledge_base.take() {
            Some(loaded) => loaded,
            None => {
                let loaded = self.store.load()?;
                match self.encoder.model_id() {
                    Ok(model_id) if model_id != loaded.manifest().model_id => warn!(
                        "Knowledge base was built with {} but queries use {}",
                        loaded.manifest().model_id,
                        model_id
                    ),
                    _ => {}
                }
                loaded
            }
        };
        Ok(self.knowledge_base.insert(knowledge_base))
    }

    /// Drop the cached knowledge base so the next query reloads it from disk
    #[inline]
    pub fn reload(&mut self) {
        self.knowledge_base = None;
    }

    /// Up to `k` chunks nearest to `query`, nearest first
    #[inline]
    pub fn retrieve(&mut self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let encoder = self.encoder;
        let knowledge_base = self.knowledge_base()?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = encoder.encode_query(query)?;
        let hits = knowledge_base
            .index()
            .search(&query_vector, k)
            .map_err(|e| {
                RagError::Embedding(format!(
                    "{e:#}. Re-ingest the document if the embedding model changed."
                ))
            })?;

        let chunks = knowledge_base.chunks();
        let retrieved: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter_map(|hit| {
                chunks.get(hit.chunk_id).map(|text| RetrievedChunk {
                    id: hit.chunk_id,
                    text: text.clone(),
                    distance: hit.distance,
                })
            })
            .collect();

        debug!(
            "Retrieved {} chunks for query ({} requested)",
            retrieved.len(),
            k
        );
        Ok(retrieved)
    }
}
