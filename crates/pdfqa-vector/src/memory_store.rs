//! In-memory vector store using cosine similarity.
//!
//! Mirrors the collection semantics of the Qdrant store (fixed dimension,
//! cosine distance, sequential point IDs) without a server. Used by tests
//! and for offline experiments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pdfqa_core::{Chunk, Hit, PdfQaError, Result};
use tokio::sync::RwLock;

use crate::{ChunkPoint, VectorStore};

#[derive(Debug, Default)]
struct MemoryCollection {
    dimension: usize,
    points: BTreeMap<u64, (Vec<f32>, Chunk)>,
}

/// An in-memory vector store.
///
/// Collections are kept in a `BTreeMap` so listing order is stable.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<BTreeMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in a collection
    pub async fn point_count(&self, name: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(name)
            .map(|c| c.points.len())
            .ok_or_else(|| PdfQaError::CollectionNotFound(name.to_string()))
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn check_dimension(name: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(PdfQaError::VectorStore(format!(
            "Vector dimension error for collection {name}: expected {expected}, got {actual}"
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn replace_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn upload_points(&self, name: &str, points: &[ChunkPoint]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| PdfQaError::CollectionNotFound(name.to_string()))?;

        for point in points {
            check_dimension(name, collection.dimension, point.vector.len())?;
            collection
                .points
                .insert(point.id, (point.vector.clone(), point.chunk.clone()));
        }
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<Hit>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| PdfQaError::CollectionNotFound(name.to_string()))?;
        check_dimension(name, collection.dimension, vector.len())?;

        let hits = collection
            .points
            .values()
            .map(|(stored, chunk)| Hit {
                chunk: chunk.clone(),
                score: cosine_similarity(stored, vector),
                collection: name.to_string(),
            })
            .collect();

        Ok(pdfqa_core::rank_hits(hits, limit))
    }
}
