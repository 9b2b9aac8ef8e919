use clap::{Parser, Subcommand};
use docqa::commands::{AskOptions, ask, chat, describe, ingest, show_status, summarize};
use docqa::config::{Config, run_interactive_config, show_config};
use docqa::{RagError, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about a PDF using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the knowledge base (default: ~/.docqa)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and generation services
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, embed, and index a PDF, replacing the current knowledge base
    Ingest {
        /// PDF to ingest; defaults to the first PDF in the data directory
        path: Option<PathBuf>,
    },
    /// Answer a question using the ingested document as context
    Ask {
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
        /// Maximum tokens in the answer
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Do not print the retrieved sources
        #[arg(long)]
        no_sources: bool,
    },
    /// Summarize the ingested document
    Summarize,
    /// Describe the contents of an image
    Describe {
        /// Image file (PNG or JPEG)
        image: PathBuf,
    },
    /// Show knowledge base and service status
    Status,
    /// Start an interactive chat session
    Chat,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::config_dir().map_err(|e| RagError::Config(e.to_string()))?,
    };

    if let Commands::Config { show: false } = cli.command {
        run_interactive_config(&config_dir)?;
        return Ok(());
    }

    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { .. } => show_config(&config),
        Commands::Ingest { path } => ingest(&config, path.as_deref())?,
        Commands::Ask {
            question,
            top_k,
            temperature,
            max_tokens,
            no_sources,
        } => {
            let defaults = AskOptions::from_config(&config);
            let options = AskOptions {
                top_k: top_k.unwrap_or(defaults.top_k),
                temperature: temperature.unwrap_or(defaults.temperature),
                max_tokens: max_tokens.unwrap_or(defaults.max_tokens),
                show_sources: !no_sources,
            };
            ask(&config, &question, options)?;
        }
        Commands::Summarize => summarize(&config)?,
        Commands::Describe { image } => describe(&config, &image)?,
        Commands::Status => show_status(&config)?,
        Commands::Chat => chat(&config)?,
    }

    Ok(())
}
