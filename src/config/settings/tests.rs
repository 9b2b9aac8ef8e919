use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.generation.model, "llama-3.3-70b-versatile");
    assert_eq!(config.generation.api_key_env, "GROQ_API_KEY");
    assert_eq!(config.extraction.min_native_chars, 50);
    assert_eq!(config.extraction.ocr_dpi, 300);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.retrieval.summary_char_budget, 30_000);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.base_url = "not a url".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.temperature = 2.5;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.extraction.ocr_dpi = 10;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidOcrDpi(10))
    ));

    let mut invalid_config = config.clone();
    invalid_config.extraction.tesseract_command = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn completions_url_keeps_base_path() {
    let mut config = GenerationConfig::default();
    let url = config
        .completions_url()
        .expect("should build completions url");
    assert_eq!(
        url.as_str(),
        "https://api.groq.com/openai/v1/chat/completions"
    );

    config.base_url = "http://localhost:8080/v1/".to_string();
    let url = config
        .completions_url()
        .expect("should build completions url");
    assert_eq!(url.as_str(), "http://localhost:8080/v1/chat/completions");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());

    let mut generation = GenerationConfig::default();
    assert!(generation.set_temperature(0.0).is_ok());
    assert!(generation.set_temperature(-0.1).is_err());
    assert!(generation.set_max_tokens(4096).is_ok());
    assert!(generation.set_max_tokens(0).is_err());
    assert!(
        generation
            .set_base_url("http://127.0.0.1:9000/v1".to_string())
            .is_ok()
    );
    assert!(generation.set_base_url("ftp://host".to_string()).is_err());
    assert!(generation.set_vision_model("   ".to_string()).is_err());
}

#[test]
fn load_missing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("missing config falls back to defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("defaults load");
    config.generation.model = "llama-3.1-8b-instant".to_string();
    config.retrieval.top_k = 5;
    config.save().expect("config saves");

    let reloaded = Config::load(temp_dir.path()).expect("config reloads");
    assert_eq!(reloaded, config);
    assert!(temp_dir.path().join("config.toml").exists());
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn derived_paths() {
    let config = Config {
        base_dir: PathBuf::from("/srv/docqa"),
        ..Default::default()
    };

    assert_eq!(
        config.chunks_path(),
        PathBuf::from("/srv/docqa/data/chunks.json")
    );
    assert_eq!(
        config.index_path(),
        PathBuf::from("/srv/docqa/vector_db/index.bin")
    );
    assert_eq!(
        config.manifest_path(),
        PathBuf::from("/srv/docqa/vector_db/manifest.json")
    );
    assert_eq!(config.data_dir(), PathBuf::from("/srv/docqa/data"));
}
