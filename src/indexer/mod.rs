// Indexer module
// Runs a document through extraction, embedding, and knowledge base replacement


use tracing::{debug, info, warn};

use crate::embeddings::EmbeddingEncoder;
use crate::extraction::{PageExtractor, PageSource, PageWarning};
use crate::knowledge::{KnowledgeBaseStore, Manifest, VectorIndex};
use crate::{RagError, Result};

/// Ingestion step reported to the caller as it happens
#[derive(Debug, Clone, PartialEq)]
pub enum IndexingProgress {
    PageStarted {
        page_number: usize,
        total_pages: usize,
    },
    OcrUsed {
        page_number: usize,
    },
    PageWarning(PageWarning),
    GeneratingEmbeddings {
        chunks: usize,
    },
    Saving,
    Completed(IndexingStats),
}

/// Summary of a finished ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub pages_processed: usize,
    pub ocr_pages: usize,
    pub blank_pages: usize,
    pub warnings: usize,
    pub embedding_dimension: usize,
}

/// Replaces the knowledge base with the contents of one document
///
/// Every page becomes exactly one chunk, blank pages included, so chunk ids stay equal to
/// page indexes. Nothing is written until all pages are extracted and embedded.
pub struct Indexer<'a> {
    extractor: &'a PageExtractor,
    encoder: &'a EmbeddingEncoder,
    store: &'a KnowledgeBaseStore,
}

impl<'a> Indexer<'a> {
    #[inline]
    pub fn new(
        extractor: &'a PageExtractor,
        encoder: &'a EmbeddingEncoder,
        store: &'a KnowledgeBaseStore,
    ) -> Self {
        Self {
            extractor,
            encoder,
            store,
        }
    }

    #[inline]
    pub fn ingest(
        &self,
        source: &dyn PageSource,
        progress: &mut dyn FnMut(&IndexingProgress),
    ) -> Result<(IndexingStats, Manifest)> {
        let total_pages = source.page_count();
        info!(
            "Ingesting {} ({} pages)",
            source.name().unwrap_or("document"),
            total_pages
        );

        let mut chunks = Vec::with_capacity(total_pages);
        let mut stats = IndexingStats {
            pages_processed: 0,
            ocr_pages: 0,
            blank_pages: 0,
            warnings: 0,
            embedding_dimension: 0,
        };

        for index in 0..total_pages {
            let page_number = index + 1;
            progress(&IndexingProgress::PageStarted {
                page_number,
                total_pages,
            });

            let page = self.extractor.extract(source, index);

            if page.ocr_used {
                stats.ocr_pages += 1;
                progress(&IndexingProgress::OcrUsed { page_number });
            }
            if let Some(warning) = page.warning {
                stats.warnings += 1;
                progress(&IndexingProgress::PageWarning(warning));
            }
            if page.text.trim().is_empty() {
                debug!("Page {} is blank", page_number);
                stats.blank_pages += 1;
            }

            chunks.push(page.text);
            stats.pages_processed += 1;
        }

        if stats.blank_pages == chunks.len() {
            warn!("No text extracted from any page, keeping the existing knowledge base");
            return Err(RagError::EmptyDocument);
        }

        progress(&IndexingProgress::GeneratingEmbeddings {
            chunks: chunks.len(),
        });
        let embeddings = self.encoder.encode(&chunks)?;
        let index = VectorIndex::build(&embeddings)
            .map_err(|e| RagError::Embedding(format!("{e:#}")))?;
        let model_id = self.encoder.model_id()?;
        stats.embedding_dimension = index.dimension();

        progress(&IndexingProgress::Saving);
        let manifest = self
            .store
            .replace(&chunks, &index, &model_id, source.name())?;

        info!(
            "Indexed {} pages ({} via OCR, {} blank, {} warnings)",
            stats.pages_processed, stats.ocr_pages, stats.blank_pages, stats.warnings
        );
        progress(&IndexingProgress::Completed(stats.clone()));

        Ok((stats, manifest))
    }
}
