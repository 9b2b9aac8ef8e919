// Generation module
// Builds answer, summary, and image prompts and sends them to a text-generation service


pub mod chat;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use crate::{RagError, Result};

pub use chat::ChatClient;

pub const DEFAULT_SUMMARY_CHAR_BUDGET: usize = 30_000;
pub const TRUNCATION_MARKER: &str = "...\n(Content truncated for length)";

const ANSWER_INSTRUCTION: &str = "You are a highly intelligent and versatile AI assistant.

Instructions:
1. **Primary Goal**: Answer the user's question helpfully, accurately, and creatively.
2. **Context Usage**: You have access to document excerpts (Context) below. Use them if they help answer the question.
3. **General Knowledge**: If the Context is not relevant or does not contain the answer, ignore it completely and answer from your own general knowledge like a standard AI assistant.
4. **Tone**: Be friendly, professional, and conversational.";

const SUMMARY_INSTRUCTION: &str =
    "You are a helpful assistant. Please provide a comprehensive summary of the following document.";

const IMAGE_INSTRUCTION: &str = "Analyze this image in detail. Describe everything you see, including objects, text, colors, and context.";

/// One text-only generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    /// `None` leaves the service default in place
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// One image-description call with the image inlined as base64
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub instruction: String,
    pub image_base64: String,
    pub mime_type: &'static str,
}

impl ImageRequest {
    /// `data:` URL carrying the image payload
    #[inline]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.image_base64)
    }
}

/// A hosted text-generation service with an image-capable variant
pub trait GenerationService: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;

    fn describe_image(&self, request: &ImageRequest) -> anyhow::Result<String>;
}

/// Turns retrieved context, whole documents, and images into generated text
pub struct AnswerComposer {
    service: Box<dyn GenerationService>,
    summary_char_budget: usize,
}

impl AnswerComposer {
    #[inline]
    pub fn new(service: Box<dyn GenerationService>) -> Self {
        Self {
            service,
            summary_char_budget: DEFAULT_SUMMARY_CHAR_BUDGET,
        }
    }

    #[inline]
    pub fn with_summary_budget(mut self, chars: usize) -> Self {
        self.summary_char_budget = chars;
        self
    }

    /// Answer `query` using `context` chunks as optional supporting material
    #[inline]
    pub fn answer(
        &self,
        query: &str,
        context: &[String],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = answer_request(query, context, temperature, max_tokens);
        debug!(
            "Requesting answer with {} context chunks ({} chars)",
            context.len(),
            request.user.len()
        );
        self.service.generate(&request).map_err(service_failure)
    }

    /// Summarize the whole document, truncated to the configured character budget
    #[inline]
    pub fn summarize(&self, chunks: &[String]) -> Result<String> {
        let request = summary_request(chunks, self.summary_char_budget)?;
        info!("Requesting summary of {} chunks", chunks.len());
        self.service.generate(&request).map_err(service_failure)
    }

    #[inline]
    pub fn describe_image(&self, image: &[u8]) -> Result<String> {
        let request = image_request(image)?;
        info!(
            "Requesting description of {} byte {} image",
            image.len(),
            request.mime_type
        );
        self.service.describe_image(&request).map_err(service_failure)
    }
}

/// Prompt pair for a context-augmented answer
#[inline]
pub fn answer_request(
    query: &str,
    context: &[String],
    temperature: f32,
    max_tokens: u32,
) -> GenerationRequest {
    let context_text = context
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Source {i}: {text}"))
        .collect::<Vec<_>>()
        .join("\n");

    GenerationRequest {
        system: ANSWER_INSTRUCTION.to_string(),
        user: format!("CONTEXT FROM DOCUMENTS:\n{context_text}\n\nUSER QUESTION:\n{query}"),
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
    }
}

/// Prompt pair for summarizing `chunks`, rejecting documents with no usable text
#[inline]
pub fn summary_request(chunks: &[String], char_budget: usize) -> Result<GenerationRequest> {
    if chunks.iter().all(|chunk| chunk.trim().is_empty()) {
        return Err(RagError::EmptySummarizationInput);
    }

    let full_text = truncate_chars(&chunks.join("\n"), char_budget);

    Ok(GenerationRequest {
        system: SUMMARY_INSTRUCTION.to_string(),
        user: format!("Document Content:\n{full_text}"),
        temperature: None,
        max_tokens: None,
    })
}

#[inline]
pub fn image_request(image: &[u8]) -> Result<ImageRequest> {
    if image.is_empty() {
        return Err(RagError::Document("image is empty".to_string()));
    }

    Ok(ImageRequest {
        instruction: IMAGE_INSTRUCTION.to_string(),
        image_base64: STANDARD.encode(image),
        mime_type: image_mime_type(image),
    })
}

/// MIME type sniffed from the image header, JPEG when unrecognised
fn image_mime_type(image: &[u8]) -> &'static str {
    match image::guess_format(image) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/jpeg",
    }
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().nth(budget).is_none() {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(budget).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

fn service_failure(error: anyhow::Error) -> RagError {
    RagError::Service(format!("{error:#}"))
}
