//! PDF Q&A Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development. The resulting [`AppConfig`] is
//! built once at process start and passed into every pipeline entry point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Vector store connection
    pub vector_store: VectorStoreConfig,

    /// Sentence-embedding model
    pub embedding: EmbeddingConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// RAG pipeline configuration
    pub rag: RagConfig,

    /// Upload directory
    pub upload: UploadConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Qdrant
        if let Some(url) = env_var("QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Some(key) = env_var("QDRANT_API_KEY") {
            self.vector_store.api_key = Some(key);
        }

        // Embedding
        if let Some(model) = env_var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dir) = env_var("EMBEDDING_CACHE_DIR") {
            self.embedding.cache_dir = Some(PathBuf::from(dir));
        }

        // LLM
        if let Some(provider) = env_var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = env_var("GROQ_API_KEY") {
            self.llm.groq_api_key = Some(key);
        }
        if let Some(key) = env_var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = env_var("LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(url) = env_var("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Some(model) = env_var("LLM_MODEL") {
            self.llm.model = model;
        }

        // RAG
        if let Some(size) = env_var("CHUNK_SIZE") {
            self.rag.chunk_size = parse_value("CHUNK_SIZE", size)?;
        }
        if let Some(overlap) = env_var("CHUNK_OVERLAP") {
            self.rag.chunk_overlap = parse_value("CHUNK_OVERLAP", overlap)?;
        }
        if let Some(top_k) = env_var("TOP_K") {
            self.rag.top_k = parse_value("TOP_K", top_k)?;
        }
        if let Some(policy) = env_var("MISSING_COLLECTION_POLICY") {
            self.rag.missing_collection = policy.parse()?;
        }

        // Uploads
        if let Some(dir) = env_var("UPLOAD_DIR") {
            self.upload.dir = PathBuf::from(dir);
        }

        // Logging
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "rag.chunk_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "rag.chunk_overlap".to_string(),
                value: format!(
                    "{} (must be smaller than chunk_size {})",
                    self.rag.chunk_overlap, self.rag.chunk_size
                ),
            });
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "rag.top_k".to_string(),
                value: "0".to_string(),
            });
        }
        if self.vector_store.vector_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "vector_store.vector_dimension".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Create the upload directory if it does not exist
    pub fn ensure_upload_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.upload.dir).map_err(|e| ConfigError::FileReadError {
            path: self.upload.dir.clone(),
            source: e,
        })
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Vector store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Qdrant gRPC URL
    pub url: String,

    /// Qdrant API key (hosted clusters)
    pub api_key: Option<String>,

    /// Vector dimension (must match embedding model)
    pub vector_dimension: usize,

    /// Points per upload request
    pub upload_batch_size: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            vector_dimension: 384, // all-MiniLM-L6-v2
            upload_batch_size: 64,
        }
    }
}

/// Sentence-embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model name (short name or fastembed model code)
    pub model: String,

    /// Where downloaded model files are cached
    pub cache_dir: Option<PathBuf>,

    /// Texts per inference batch
    pub batch_size: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
            batch_size: None,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// Groq API key
    pub groq_api_key: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Override for the provider's API base URL
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion (provider default when unset)
    pub max_tokens: Option<u32>,

    /// Temperature for generation (provider default when unset)
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// API key for the configured hosted provider
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            LlmProvider::Groq => self.groq_api_key.as_deref(),
            LlmProvider::OpenAI => self.openai_api_key.as_deref(),
            LlmProvider::Ollama => None,
        }
    }

    /// Return the API key or fail if the provider needs one
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.provider {
            LlmProvider::Groq => self
                .groq_api_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingRequired("GROQ_API_KEY".to_string())),
            LlmProvider::OpenAI => self
                .openai_api_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string())),
            LlmProvider::Ollama => Ok(""),
        }
    }

    /// Base URL for the configured provider
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProvider::Groq => "https://api.groq.com/openai/v1".to_string(),
            LlmProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => self.ollama_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            groq_api_key: None,
            openai_api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3-70b-8192".to_string(),
            max_tokens: None,
            temperature: None,
            timeout_secs: 120,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// What retrieval does with a collection that does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCollectionPolicy {
    /// Abort the query with `CollectionNotFound`
    #[default]
    Fail,
    /// Log a warning and query the remaining collections
    Skip,
}

impl std::str::FromStr for MissingCollectionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            _ => Err(ConfigError::InvalidValue {
                key: "MISSING_COLLECTION_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Chunk window size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Number of hits used to answer a question
    pub top_k: usize,

    /// Handling of unknown collections during retrieval
    pub missing_collection: MissingCollectionPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 6,
            missing_collection: MissingCollectionPolicy::Fail,
        }
    }
}

/// Upload directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory holding raw PDF uploads
    pub dir: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that touch the process environment run one at a time
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "QDRANT_URL",
        "QDRANT_API_KEY",
        "EMBEDDING_MODEL",
        "EMBEDDING_CACHE_DIR",
        "LLM_PROVIDER",
        "GROQ_API_KEY",
        "OPENAI_API_KEY",
        "LLM_BASE_URL",
        "OLLAMA_URL",
        "LLM_MODEL",
        "CHUNK_SIZE",
        "CHUNK_OVERLAP",
        "TOP_K",
        "MISSING_COLLECTION_POLICY",
        "UPLOAD_DIR",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    /// Run `f` with only `vars` set among the configuration variables,
    /// restoring the previous environment afterwards
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let saved: Vec<(&str, Option<String>)> =
            ENV_KEYS.iter().map(|k| (*k, std::env::var(k).ok())).collect();
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let result = f();

        for (key, value) in saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.vector_store.vector_dimension, 384);
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(config.llm.provider, LlmProvider::Groq);
        assert_eq!(config.llm.model, "llama3-70b-8192");
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 6);
        assert_eq!(config.upload.dir, PathBuf::from("uploads"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!("groq".parse::<LlmProvider>().unwrap(), LlmProvider::Groq);
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert_eq!("ollama".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_missing_collection_policy_parse() {
        assert_eq!(
            "skip".parse::<MissingCollectionPolicy>().unwrap(),
            MissingCollectionPolicy::Skip
        );
        assert_eq!(
            "FAIL".parse::<MissingCollectionPolicy>().unwrap(),
            MissingCollectionPolicy::Fail
        );
        assert!("ignore".parse::<MissingCollectionPolicy>().is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.rag.chunk_overlap = config.rag.chunk_size;
        assert!(config.validate().is_err());

        config.rag.chunk_overlap = 0;
        config.rag.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolved_base_url() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.resolved_base_url(), "https://api.groq.com/openai/v1");

        llm.provider = LlmProvider::OpenAI;
        assert_eq!(llm.resolved_base_url(), "https://api.openai.com/v1");

        llm.base_url = Some("http://proxy.local/v1/".to_string());
        assert_eq!(llm.resolved_base_url(), "http://proxy.local/v1");
    }

    #[test]
    fn test_require_api_key() {
        let mut llm = LlmConfig::default();
        assert!(matches!(
            llm.require_api_key(),
            Err(ConfigError::MissingRequired(key)) if key == "GROQ_API_KEY"
        ));

        llm.groq_api_key = Some("gsk_test".to_string());
        assert_eq!(llm.require_api_key().unwrap(), "gsk_test");

        llm.provider = LlmProvider::Ollama;
        assert!(llm.require_api_key().is_ok());
        assert!(llm.api_key().is_none());
    }

    #[test]
    fn test_from_file_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdfqa.toml");
        std::fs::write(
            &path,
            r#"
[vector_store]
url = "https://cluster.qdrant.io:6334"

[rag]
top_k = 3
missing_collection = "skip"
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.vector_store.url, "https://cluster.qdrant.io:6334");
        assert_eq!(config.vector_store.vector_dimension, 384);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.missing_collection, MissingCollectionPolicy::Skip);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            AppConfig::from_file(&missing),
            Err(ConfigError::FileReadError { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[rag\ntop_k = ").unwrap();
        assert!(matches!(
            AppConfig::from_file(&broken),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_ensure_upload_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.upload.dir = dir.path().join("nested").join("uploads");

        config.ensure_upload_dir().unwrap();
        assert!(config.upload.dir.is_dir());
    }

    #[test]
    fn test_from_env_applies_variables() {
        let config = with_env(
            &[
                ("LLM_PROVIDER", "ollama"),
                ("LLM_MODEL", "llama3.1"),
                ("MISSING_COLLECTION_POLICY", "skip"),
                ("LOG_FORMAT", "JSON"),
                ("TOP_K", "7"),
                ("UPLOAD_DIR", "/srv/pdfs"),
            ],
            AppConfig::from_env,
        )
        .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.model, "llama3.1");
        assert_eq!(config.rag.missing_collection, MissingCollectionPolicy::Skip);
        assert!(config.logging.json_format);
        assert_eq!(config.rag.top_k, 7);
        assert_eq!(config.upload.dir, PathBuf::from("/srv/pdfs"));
    }

    #[test]
    fn test_from_env_ignores_blank_values() {
        let config = with_env(&[("QDRANT_URL", "   "), ("GROQ_API_KEY", "")], AppConfig::from_env)
            .unwrap();

        assert_eq!(config.vector_store.url, "http://localhost:6334");
        assert!(config.llm.groq_api_key.is_none());
    }

    #[test]
    fn test_from_env_rejects_unparsable_numbers() {
        let result = with_env(&[("CHUNK_SIZE", "abc")], AppConfig::from_env);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key, value }) if key == "CHUNK_SIZE" && value == "abc"
        ));

        let result = with_env(&[("LLM_PROVIDER", "mistral")], AppConfig::from_env);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdfqa.toml");
        std::fs::write(
            &path,
            r#"
[vector_store]
url = "http://file-host:6334"

[rag]
top_k = 3
chunk_size = 800
"#,
        )
        .unwrap();

        let config = with_env(&[("QDRANT_URL", "http://env-host:6334"), ("TOP_K", "9")], || {
            AppConfig::from_file(&path)?.with_env_override()
        })
        .unwrap();

        assert_eq!(config.vector_store.url, "http://env-host:6334");
        assert_eq!(config.rag.top_k, 9);
        // Values without an env counterpart keep the file setting
        assert_eq!(config.rag.chunk_size, 800);
    }
}
