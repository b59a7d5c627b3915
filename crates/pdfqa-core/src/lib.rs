//! PDF Q&A Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the PDF Q&A system:
//! - Chunk and hit records exchanged between ingestion, retrieval and synthesis
//! - Collection naming rules
//! - Common error types
//! - The LLM client trait
//! - Configuration management

pub mod collection;
pub mod config;

pub use collection::{collection_name_for_path, derive_collection_name, validate_collection_name};
pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, LlmConfig, LlmProvider, LoggingConfig,
    MissingCollectionPolicy, RagConfig, UploadConfig, VectorStoreConfig,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for PDF Q&A operations
#[derive(Error, Debug)]
pub enum PdfQaError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read document {path}: {message}")]
    Document { path: PathBuf, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for PdfQaError {
    fn from(err: ConfigError) -> Self {
        PdfQaError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfQaError>;

// ============================================================================
// Chunks and Hits
// ============================================================================

/// A span of document text, the unit of embedding and retrieval.
///
/// This is also the exact payload stored with each vector point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub text: String,

    /// File name of the originating document
    pub source: String,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// A retrieved chunk with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Retrieved chunk
    pub chunk: Chunk,

    /// Cosine similarity to the query (higher is better)
    pub score: f32,

    /// Collection the chunk was found in
    pub collection: String,
}

/// Sort hits by descending score and keep at most `top_k`.
///
/// NaN scores sort last. Order among equal scores is unspecified.
pub fn rank_hits(mut hits: Vec<Hit>, top_k: usize) -> Vec<Hit> {
    hits.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.score.total_cmp(&a.score),
    });
    hits.truncate(top_k);
    hits
}

// ============================================================================
// LLM Types
// ============================================================================

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a list of messages and return the generated completion text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Send a single-turn user prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)]).await
    }

    /// Model name for logging
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
