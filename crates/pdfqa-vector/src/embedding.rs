//! Embedding client for generating vector representations
//!
//! Runs a pre-trained sentence-transformer locally through fastembed
//! (ONNX runtime). The default model, all-MiniLM-L6-v2, produces
//! 384-dimension vectors.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use pdfqa_core::{EmbeddingConfig, PdfQaError, Result};
use tokio::sync::Mutex;

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| PdfQaError::Embedding("No embedding returned".to_string()))
    }

    /// Generate embeddings for multiple texts (batch), in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

// ============================================================================
// fastembed Client
// ============================================================================

/// Resolve a configured model name to a fastembed model.
///
/// Accepts the sentence-transformers short names as well as fastembed
/// model codes such as `Qdrant/all-MiniLM-L6-v2-onnx`.
pub fn resolve_model(name: &str) -> Result<EmbeddingModel> {
    let short = name
        .trim()
        .trim_start_matches("sentence-transformers/")
        .to_lowercase();

    match short.as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "paraphrase-multilingual-minilm-l12-v2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        _ => name
            .parse::<EmbeddingModel>()
            .map_err(|e| PdfQaError::Config(format!("Unknown embedding model {name}: {e}"))),
    }
}

/// Local sentence-embedding model
pub struct FastEmbedClient {
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
    batch_size: Option<usize>,
}

impl FastEmbedClient {
    /// Load the configured model, downloading it on first use.
    ///
    /// `dimension` is the vector size the vector store expects; every
    /// produced vector is checked against it.
    pub fn new(config: &EmbeddingConfig, dimension: usize) -> Result<Self> {
        let model = resolve_model(&config.model)?;

        let mut options = TextInitOptions::new(model).with_show_download_progress(false);
        if let Some(dir) = &config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        tracing::info!(model = %config.model, "loading embedding model");
        let embedding = TextEmbedding::try_new(options).map_err(|e| {
            PdfQaError::Embedding(format!("Failed to load model {}: {e}", config.model))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            dimension,
            batch_size: config.batch_size,
        })
    }
}

#[async_trait]
impl EmbeddingClient for FastEmbedClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // ONNX inference is CPU-bound; keep it off the async workers
        let model = Arc::clone(&self.model);
        let owned = texts.to_vec();
        let batch_size = self.batch_size;
        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model.blocking_lock();
            model.embed(owned, batch_size)
        })
        .await
        .map_err(|e| PdfQaError::Embedding(format!("Embedding task failed: {e}")))?
        .map_err(|e| PdfQaError::Embedding(format!("Embedding inference failed: {e}")))?;

        check_vectors(texts.len(), &vectors, self.dimension)?;
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Verify count and dimension of a batch of embeddings
pub fn check_vectors(expected_count: usize, vectors: &[Vec<f32>], dimension: usize) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(PdfQaError::Embedding(format!(
            "Embedding result count mismatch: expected {expected_count}, got {}",
            vectors.len()
        )));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(PdfQaError::Embedding(format!(
            "Embedding dimension mismatch: expected {dimension}, got {}",
            bad.len()
        )));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_short_names() {
        assert_eq!(
            resolve_model("all-MiniLM-L6-v2").unwrap(),
            EmbeddingModel::AllMiniLML6V2
        );
        assert_eq!(
            resolve_model("sentence-transformers/all-MiniLM-L6-v2").unwrap(),
            EmbeddingModel::AllMiniLML6V2
        );
        assert_eq!(
            resolve_model("all-MiniLM-L12-v2").unwrap(),
            EmbeddingModel::AllMiniLML12V2
        );
        assert_eq!(
            resolve_model("BAAI/bge-small-en-v1.5").unwrap(),
            EmbeddingModel::BGESmallENV15
        );
    }

    #[test]
    fn test_resolve_unknown_model() {
        assert!(matches!(
            resolve_model("definitely-not-a-model"),
            Err(PdfQaError::Config(_))
        ));
    }

    #[test]
    fn test_check_vectors() {
        let vectors = vec![vec![0.0; 4], vec![1.0; 4]];
        assert!(check_vectors(2, &vectors, 4).is_ok());
        assert!(check_vectors(3, &vectors, 4).is_err());
        assert!(check_vectors(2, &vectors, 384).is_err());
    }

    struct ConstantEmbedding;

    #[async_trait]
    impl EmbeddingClient for ConstantEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_default_embed_uses_batch() {
        let vector = ConstantEmbedding.embed("abc").await.unwrap();
        assert_eq!(vector, vec![3.0, 1.0]);
    }

    #[tokio::test(flavor = "current_thread")]
    #[ignore = "downloads the all-MiniLM-L6-v2 model"]
    async fn test_fastembed_inference_on_blocking_pool() {
        let client = FastEmbedClient::new(&EmbeddingConfig::default(), 384).unwrap();

        // A single-threaded runtime must stay responsive while the model runs
        let ticker = tokio::spawn(async { tokio::task::yield_now().await });
        let texts = vec!["Paris is the capital of France.".to_string(), "Berlin".to_string()];
        let vectors = client.embed_batch(&texts).await.unwrap();
        ticker.await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 384));
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    }
}
