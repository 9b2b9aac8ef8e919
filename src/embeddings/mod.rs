// Embeddings module
// Maps chunk and query text into one shared vector space

#[cfg(test)]
mod tests;

pub mod ollama;

use anyhow::Context;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::{RagError, Result};

pub use ollama::OllamaClient;

/// A text embedding model
pub trait EmbeddingModel: Send + Sync {
    /// Identifier recorded in the knowledge base manifest
    fn model_id(&self) -> &str;

    /// Embed `texts`, returning one vector per input in the same order
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

type ModelLoader = Box<dyn Fn() -> anyhow::Result<Arc<dyn EmbeddingModel>> + Send + Sync>;

/// Encodes chunks and queries with a single shared model instance
///
/// The model is created on first use and reused for every later call. Concurrent first calls
/// are serialised by a lock, so the loader runs at most once successfully.
pub struct EmbeddingEncoder {
    loader: ModelLoader,
    model: Mutex<Option<Arc<dyn EmbeddingModel>>>,
}

impl EmbeddingEncoder {
    /// Wrap an already initialised model
    #[inline]
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        let loaded = Arc::clone(&model);
        Self {
            loader: Box::new(move || Ok(Arc::clone(&loaded))),
            model: Mutex::new(Some(model)),
        }
    }

    /// Defer model creation until the first encode call
    #[inline]
    pub fn lazy<F>(loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn EmbeddingModel>> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: Mutex::new(None),
        }
    }

    fn model(&self) -> Result<Arc<dyn EmbeddingModel>> {
        let mut slot = self
            .model
            .lock()
            .map_err(|_| RagError::Embedding("embedding model lock poisoned".to_string()))?;

        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        info!("Initializing embedding model");
        let model = (self.loader)()
            .context("Failed to initialize embedding model")
            .map_err(|e| RagError::Embedding(format!("{e:#}")))?;
        info!("Embedding model {} ready", model.model_id());

        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    #[inline]
    pub fn model_id(&self) -> Result<String> {
        Ok(self.model()?.model_id().to_string())
    }

    /// Embed an ordered batch of texts
    #[inline]
    pub fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model()?;
        debug!("Encoding {} texts with {}", texts.len(), model.model_id());

        let vectors = model
            .embed_batch(texts)
            .map_err(|e| RagError::Embedding(format!("{e:#}")))?;

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Model returned {} embeddings for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(RagError::Embedding(
                "Model returned an empty embedding".to_string(),
            ));
        }
        if let Some(position) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(RagError::Embedding(format!(
                "Embedding {} has {} dimensions, expected {}",
                position,
                vectors[position].len(),
                dimension
            )));
        }

        Ok(vectors)
    }

    /// Embed a single query through the same path as chunk text
    #[inline]
    pub fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        self.encode(&[query.to_string()])?
            .pop()
            .ok_or_else(|| RagError::Embedding("Model returned no embedding".to_string()))
    }
}
