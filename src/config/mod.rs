// Configuration management module
// Handles TOML configuration for embedding, generation, extraction and retrieval

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, GenerationConfig, OllamaConfig, RetrievalConfig};
