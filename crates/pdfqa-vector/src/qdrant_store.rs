//! Qdrant implementation for vector storage
//!
//! Provides connection management and vector operations
//! for document chunk embeddings. One Qdrant collection holds the
//! chunks of one document.

use std::collections::HashMap;

use async_trait::async_trait;
use pdfqa_core::{Chunk, Hit, PdfQaError, Result, VectorStoreConfig};
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};

use crate::{ChunkPoint, VectorStore};

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
    batch_size: usize,
}

impl QdrantStore {
    /// Create a new Qdrant client from config.
    ///
    /// The connection is established lazily on the first request.
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| PdfQaError::VectorStore(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            batch_size: config.upload_batch_size.max(1),
        })
    }
}

fn to_point(point: &ChunkPoint) -> Result<PointStruct> {
    let value = serde_json::to_value(&point.chunk)
        .map_err(|e| PdfQaError::VectorStore(format!("Failed to encode payload: {e}")))?;
    let payload = Payload::try_from(value)
        .map_err(|e| PdfQaError::VectorStore(format!("Failed to encode payload: {e}")))?;

    Ok(PointStruct::new(point.id, point.vector.clone(), payload))
}

fn json_value(value: Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(json_value).collect())
        }
        Some(Kind::StructValue(object)) => serde_json::Value::Object(
            object
                .fields
                .into_iter()
                .map(|(k, v)| (k, json_value(v)))
                .collect(),
        ),
    }
}

/// Decode a stored payload back into the chunk record it was written from
fn chunk_from_payload(payload: HashMap<String, Value>) -> Result<Chunk> {
    let object: serde_json::Map<String, serde_json::Value> = payload
        .into_iter()
        .map(|(k, v)| (k, json_value(v)))
        .collect();

    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| PdfQaError::VectorStore(format!("Malformed chunk payload: {e}")))
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let response =
            self.client.list_collections().await.map_err(|e| {
                PdfQaError::VectorStore(format!("Failed to list collections: {e}"))
            })?;

        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| PdfQaError::VectorStore(format!("Failed to check collection {name}: {e}")))
    }

    async fn replace_collection(&self, name: &str, dimension: usize) -> Result<()> {
        if self.collection_exists(name).await? {
            tracing::info!(collection = name, "replacing existing collection");
            self.delete_collection(name).await?;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| PdfQaError::VectorStore(format!("Failed to create collection: {e}")))?;

        tracing::debug!(collection = name, dimension, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }

        self.client
            .delete_collection(name)
            .await
            .map_err(|e| PdfQaError::VectorStore(format!("Failed to delete collection: {e}")))?;

        tracing::debug!(collection = name, "deleted qdrant collection");
        Ok(true)
    }

    async fn upload_points(&self, name: &str, points: &[ChunkPoint]) -> Result<()> {
        for batch in points.chunks(self.batch_size) {
            let structs = batch.iter().map(to_point).collect::<Result<Vec<_>>>()?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(name, structs).wait(true))
                .await
                .map_err(|e| PdfQaError::VectorStore(format!("Failed to upsert points: {e}")))?;

            tracing::debug!(collection = name, count = batch.len(), "uploaded batch");
        }

        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<Hit>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, vector.to_vec(), limit as u64).with_payload(true),
            )
            .await
            .map_err(|e| PdfQaError::VectorStore(format!("Vector search failed: {e}")))?;

        results
            .result
            .into_iter()
            .map(|point| {
                Ok(Hit {
                    chunk: chunk_from_payload(point.payload)?,
                    score: point.score,
                    collection: name.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_payload_carries_chunk_fields() {
        let point = ChunkPoint {
            id: 7,
            vector: vec![0.1, 0.2, 0.3],
            chunk: Chunk::new("The capital of France is Paris.", "france.pdf"),
        };

        let point = to_point(&point).unwrap();
        assert_eq!(
            point.payload.get("text").and_then(|v| v.as_str()).map(|s| s.as_str()),
            Some("The capital of France is Paris.")
        );
        assert_eq!(
            point.payload.get("source").and_then(|v| v.as_str()).map(|s| s.as_str()),
            Some("france.pdf")
        );
    }

    #[test]
    fn test_payload_decodes_to_chunk() {
        let chunk = Chunk::new("The capital of France is Paris.", "france.pdf");
        let point = to_point(&ChunkPoint {
            id: 0,
            vector: vec![1.0, 0.0],
            chunk: chunk.clone(),
        })
        .unwrap();

        assert_eq!(chunk_from_payload(point.payload).unwrap(), chunk);
    }

    #[test]
    fn test_payload_without_text_is_rejected() {
        let point = to_point(&ChunkPoint {
            id: 0,
            vector: vec![1.0, 0.0],
            chunk: Chunk::new("text", "france.pdf"),
        })
        .unwrap();

        let mut payload = point.payload;
        payload.remove("text");
        assert!(matches!(
            chunk_from_payload(payload),
            Err(PdfQaError::VectorStore(_))
        ));
    }

    #[test]
    fn test_json_value_conversion() {
        assert_eq!(json_value(Value::from("abc")), serde_json::json!("abc"));
        assert_eq!(json_value(Value::from(3_i64)), serde_json::json!(3));
        assert_eq!(json_value(Value::from(true)), serde_json::json!(true));
        assert_eq!(json_value(Value { kind: None }), serde_json::Value::Null);
    }

    #[test]
    fn test_new_does_not_connect() {
        let config = VectorStoreConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(QdrantStore::new(&config).is_ok());
    }
}
