//! PDF Q&A Vector - Vector database and embedding abstraction
//!
//! Provides abstraction over vector databases (Qdrant, in-memory)
//! for storing and searching chunk embeddings, and over the
//! sentence-embedding model that produces them.

use async_trait::async_trait;
use pdfqa_core::{Chunk, Hit, Result};

pub mod embedding;
pub mod memory_store;
pub mod qdrant_store;

pub use embedding::{EmbeddingClient, FastEmbedClient};
pub use memory_store::InMemoryVectorStore;
pub use qdrant_store::QdrantStore;

/// A chunk with its vector, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPoint {
    /// Sequential ID within the collection
    pub id: u64,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// Trait for vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of all collections
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Whether a collection exists
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Drop any existing collection of this name and create an empty one
    /// with the given dimension and cosine distance.
    ///
    /// Destructive: all points previously stored under `name` are lost.
    async fn replace_collection(&self, name: &str, dimension: usize) -> Result<()>;

    /// Delete a collection; returns whether it existed
    async fn delete_collection(&self, name: &str) -> Result<bool>;

    /// Upload points into an existing collection
    async fn upload_points(&self, name: &str, points: &[ChunkPoint]) -> Result<()>;

    /// Nearest neighbours of `vector` in one collection, best first
    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<Hit>>;
}
