
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{EmbeddingEncoder, EmbeddingModel, OllamaClient};
use crate::extraction::{PageExtractor, PdfDocumentSource, TesseractOcr, load_pdfium};
use crate::generation::{AnswerComposer, ChatClient};
use crate::indexer::{Indexer, IndexingProgress};
use crate::knowledge::KnowledgeBaseStore;
use crate::retrieval::{RetrievedChunk, Retriever};
use crate::{RagError, Result};

const SOURCE_PREVIEW_CHARS: usize = 200;

/// Per-question generation settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AskOptions {
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub show_sources: bool,
}

impl AskOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            show_sources: true,
        }
    }
}

/// Who wrote a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Chat history kept by the interactive session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    #[inline]
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
        });
    }

    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[inline]
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// One line of input in the chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Question(String),
    Summarize,
    Image(PathBuf),
    Clear,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ChatInput {
    #[inline]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Question(line.to_string());
        };

        let (name, argument) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, rest)| (name, rest.trim()));

        match name {
            "quit" | "exit" | "q" => Self::Quit,
            "clear" => Self::Clear,
            "summarize" | "summary" => Self::Summarize,
            "help" | "?" => Self::Help,
            "image" if !argument.is_empty() => Self::Image(PathBuf::from(argument)),
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Shared embedding encoder; the Ollama health check runs on first use
#[inline]
pub fn build_encoder(config: &Config) -> EmbeddingEncoder {
    let ollama = config.ollama.clone();
    EmbeddingEncoder::lazy(move || {
        let client = OllamaClient::new(&ollama)?;
        client.health_check()?;
        Ok(Arc::new(client) as Arc<dyn EmbeddingModel>)
    })
}

#[inline]
pub fn build_composer(config: &Config) -> Result<AnswerComposer> {
    let client = ChatClient::from_env(&config.generation)
        .map_err(|e| RagError::Config(format!("{e:#}")))?;
    Ok(AnswerComposer::new(Box::new(client))
        .with_summary_budget(config.retrieval.summary_char_budget))
}

/// First PDF in `dir`, by file name, compared case-insensitively on the extension
#[inline]
pub fn find_document(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|e| {
        RagError::Document(format!(
            "No document given and {} could not be read: {}",
            dir.display(),
            e
        ))
    })?;

    let mut documents: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    documents.sort();

    documents.into_iter().next().ok_or_else(|| {
        RagError::Document(format!(
            "No PDF found in {}. Pass a path or place a PDF there.",
            dir.display()
        ))
    })
}

/// Replace the knowledge base with the contents of a PDF
#[inline]
pub fn ingest(config: &Config, path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => find_document(&config.data_dir())?,
    };
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    eprintln!(
        "{}",
        style(format!("Extracting content from {}", path.display())).bold()
    );

    let bytes = fs::read(&path).map_err(|e| {
        RagError::Document(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let pdfium = load_pdfium(&config.extraction).map_err(|e| RagError::Config(format!("{e:#}")))?;
    let document = PdfDocumentSource::from_bytes(&pdfium, &bytes, name)
        .map_err(|e| RagError::Document(format!("{e:#}")))?;

    let extractor = PageExtractor::from_config(&config.extraction);
    if extractor.has_ocr() && TesseractOcr::new(&config.extraction).version().is_none() {
        warn!(
            "{} could not be run; scanned pages will stay empty",
            config.extraction.tesseract_command
        );
    }

    let encoder = build_encoder(config);
    let store = KnowledgeBaseStore::from_config(config);
    let indexer = Indexer::new(&extractor, &encoder, &store);

    let bar = if console::user_attended_stderr() {
        let bar = ProgressBar::new(0);
        if let Ok(template) = ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}") {
            bar.set_style(template);
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let result = indexer.ingest(&document, &mut |event| match event {
        IndexingProgress::PageStarted {
            page_number,
            total_pages,
        } => {
            bar.set_length(*total_pages as u64);
            bar.set_position(*page_number as u64 - 1);
            bar.set_message(format!("Processing page {page_number}/{total_pages}"));
        }
        IndexingProgress::OcrUsed { page_number } => {
            bar.println(format!("  OCR used on page {page_number}"));
        }
        IndexingProgress::PageWarning(warning) => {
            bar.println(
                style(format!(
                    "  ⚠ Page {}: {}",
                    warning.page_number, warning.message
                ))
                .yellow()
                .to_string(),
            );
        }
        IndexingProgress::GeneratingEmbeddings { chunks } => {
            bar.set_position(bar.length().unwrap_or(0));
            bar.set_message(format!("Generating embeddings for {chunks} chunks"));
        }
        IndexingProgress::Saving => bar.set_message("Saving to knowledge base"),
        IndexingProgress::Completed(_) => bar.finish_and_clear(),
    });

    let (stats, manifest) = match result {
        Ok(done) => done,
        Err(e) => {
            bar.abandon();
            return Err(e);
        }
    };

    eprintln!("{}", style("✓ Knowledge base updated").green().bold());
    eprintln!("  Pages: {}", stats.pages_processed);
    eprintln!("  Pages read with OCR: {}", stats.ocr_pages);
    if stats.blank_pages > 0 {
        eprintln!("  Blank pages: {}", stats.blank_pages);
    }
    if stats.warnings > 0 {
        eprintln!("  Warnings: {}", stats.warnings);
    }
    eprintln!(
        "  Embeddings: {} × {} ({})",
        manifest.chunk_count, manifest.embedding_dimension, manifest.model_id
    );

    Ok(())
}

/// Answer one question from the knowledge base
#[inline]
pub fn ask(config: &Config, question: &str, options: AskOptions) -> Result<()> {
    let encoder = build_encoder(config);
    let store = KnowledgeBaseStore::from_config(config);
    let composer = build_composer(config)?;
    let mut retriever = Retriever::new(&encoder, &store);

    let (answer, sources) = answer_question(&mut retriever, &composer, question, options)?;

    println!("{answer}");
    if options.show_sources {
        print_sources(&sources);
    }
    Ok(())
}

fn answer_question(
    retriever: &mut Retriever<'_>,
    composer: &AnswerComposer,
    question: &str,
    options: AskOptions,
) -> Result<(String, Vec<RetrievedChunk>)> {
    let sources = retriever.retrieve(question, options.top_k)?;
    let context: Vec<String> = sources.iter().map(|chunk| chunk.text.clone()).collect();
    let answer = composer.answer(question, &context, options.temperature, options.max_tokens)?;
    Ok((answer, sources))
}

fn print_sources(sources: &[RetrievedChunk]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("{}", style("Sources:").bold());
    for chunk in sources {
        println!(
            "  {} {}",
            style(format!("[page {}, distance {:.3}]", chunk.source_page(), chunk.distance)).dim(),
            preview(&chunk.text)
        );
    }
}

fn preview(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= SOURCE_PREVIEW_CHARS {
        return flattened;
    }
    let mut cut: String = flattened.chars().take(SOURCE_PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

/// Summarize the whole ingested document
#[inline]
pub fn summarize(config: &Config) -> Result<()> {
    let store = KnowledgeBaseStore::from_config(config);
    let knowledge_base = store.load()?;
    let composer = build_composer(config)?;

    eprintln!("{}", style("Reading document and summarizing...").dim());
    println!("{}", composer.summarize(knowledge_base.chunks())?);
    Ok(())
}

/// Summarize the committed knowledge base, rejecting chunks the manifest does not cover
#[inline]
pub fn summarize_document(store: &KnowledgeBaseStore, composer: &AnswerComposer) -> Result<String> {
    let knowledge_base = store.load()?;
    composer.summarize(knowledge_base.chunks())
}

/// Describe an image file
#[inline]
pub fn describe(config: &Config, image: &Path) -> Result<()> {
    let bytes = fs::read(image).map_err(|e| {
        RagError::Document(format!("Failed to read {}: {}", image.display(), e))
    })?;
    let composer = build_composer(config)?;

    eprintln!("{}", style("Analyzing image...").dim());
    println!("{}", composer.describe_image(&bytes)?);
    Ok(())
}

/// Print knowledge base and dependency status
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    let store = KnowledgeBaseStore::from_config(config);

    println!("{}", style("Knowledge Base").bold());
    println!("  Directory: {}", config.get_base_dir().display());
    match store.load() {
        Ok(kb) => {
            let manifest = kb.manifest();
            println!("  {} text chunks indexed", manifest.chunk_count);
            if let Some(source) = &manifest.source {
                println!("  Document: {source}");
            }
            println!(
                "  Embeddings: {} dimensions ({})",
                manifest.embedding_dimension, manifest.model_id
            );
            println!(
                "  Created: {}",
                manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Consistency: {}", style("verified").green());
        }
        Err(RagError::KnowledgeBaseMissing(reason)) => {
            println!("  {} {}", style("Not available:").yellow(), reason);
            println!("  Run 'docqa ingest' to build it.");
        }
        Err(e) => return Err(e),
    }

    println!();
    println!("{}", style("Services").bold());
    match OllamaClient::new(&config.ollama).map(|client| client.with_retry_attempts(1)) {
        Ok(client) => match client.ping() {
            Ok(()) => println!(
                "  Ollama: {} at {}",
                style("reachable").green(),
                config.ollama.host
            ),
            Err(e) => println!("  Ollama: {} ({:#})", style("unreachable").red(), e),
        },
        Err(e) => println!("  Ollama: {} ({:#})", style("misconfigured").red(), e),
    }

    let api_key_set = std::env::var(&config.generation.api_key_env).is_ok();
    println!(
        "  Generation: {} via {} ({})",
        config.generation.model,
        config.generation.base_url,
        if api_key_set {
            style(format!("{} set", config.generation.api_key_env)).green()
        } else {
            style(format!("{} missing", config.generation.api_key_env)).red()
        }
    );

    let ocr = TesseractOcr::new(&config.extraction);
    match (config.extraction.ocr_enabled, ocr.version()) {
        (false, _) => println!("  OCR: disabled"),
        (true, Some(version)) => println!("  OCR: {version}"),
        (true, None) => println!(
            "  OCR: {} ({} not found)",
            style("unavailable").red(),
            config.extraction.tesseract_command
        ),
    }

    Ok(())
}

/// Interactive question-and-answer session
#[inline]
pub fn chat(config: &Config) -> Result<()> {
    let encoder = build_encoder(config);
    let store = KnowledgeBaseStore::from_config(config);
    let composer = build_composer(config)?;
    let mut retriever = Retriever::new(&encoder, &store);
    let mut conversation = Conversation::default();
    let options = AskOptions::from_config(config);

    eprintln!("{}", style("docqa chat").bold().cyan());
    eprintln!("Ask about your document. Type /help for commands.");

    loop {
        let line: String = Input::new()
            .with_prompt(style("You").bold().to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| RagError::Other(e.into()))?;

        let reply = match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Help => {
                print_chat_help();
                continue;
            }
            ChatInput::Clear => {
                conversation.clear();
                eprintln!("{}", style("Conversation cleared").dim());
                continue;
            }
            ChatInput::Unknown(command) => {
                eprintln!("{} {}", style("Unknown command:").yellow(), command);
                continue;
            }
            ChatInput::Question(question) => {
                conversation.push(Role::User, question.as_str());
                answer_question(&mut retriever, &composer, &question, options).map(
                    |(answer, sources)| {
                        if options.show_sources {
                            print_sources(&sources);
                        }
                        answer
                    },
                )
            }
            ChatInput::Summarize => {
                conversation.push(Role::User, "Summarize the document");
                summarize_document(&store, &composer)
                    .map(|summary| format!("Document Summary:\n\n{summary}"))
            }
            ChatInput::Image(path) => {
                conversation.push(Role::User, format!("[Uploaded Image] {}", path.display()));
                fs::read(&path)
                    .map_err(RagError::Io)
                    .and_then(|bytes| composer.describe_image(&bytes))
                    .map(|description| format!("Image Analysis:\n\n{description}"))
            }
        };

        match reply {
            Ok(text) => {
                println!("\n{}\n", text);
                conversation.push(Role::Assistant, text);
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                eprintln!("{} {}", style("Error:").red().bold(), e);
            }
        }
    }

    info!(
        "Chat session ended after {} messages",
        conversation.messages().len()
    );
    Ok(())
}

fn print_chat_help() {
    eprintln!("  /summarize      summarize the ingested document");
    eprintln!("  /image <path>   describe an image");
    eprintln!("  /clear          clear the conversation");
    eprintln!("  /quit           leave the session");
}
