use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("No text could be extracted from any page. The PDF might be empty or fully scanned.")]
    EmptyDocument,

    #[error("Knowledge base not found: {0}. Ingest a document first.")]
    KnowledgeBaseMissing(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Document has no text to summarize")]
    EmptySummarizationInput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod extraction;
pub mod generation;
pub mod indexer;
pub mod knowledge;
pub mod retrieval;
