//! Document ingestion
//!
//! Turns a PDF file into a freshly created vector collection: pages are
//! extracted and chunked, chunks are embedded, and only then is the
//! target collection replaced and filled. A document that fails to parse
//! or embed therefore never leaves a new collection behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfqa_core::{
    collection_name_for_path, validate_collection_name, AppConfig, Chunk, PdfQaError, Result,
};
use pdfqa_parser::{chunk_document, ChunkConfig, DocumentParser, ParserError, PdfParser};
use pdfqa_vector::{ChunkPoint, EmbeddingClient, VectorStore};
use serde::{Deserialize, Serialize};

/// Summary of one ingested document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Collection the document was stored in
    pub collection: String,

    /// File name recorded as the chunk source
    pub source: String,

    /// Pages extracted from the PDF
    pub page_count: usize,

    /// Chunks embedded and uploaded
    pub chunk_count: usize,
}

/// Parses, chunks, embeds and stores PDF documents
pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    parser: Arc<dyn DocumentParser>,
    chunk_config: ChunkConfig,
    upload_dir: PathBuf,
}

impl Ingestor {
    /// Create an ingestor using the PDF parser and the configured
    /// chunk window and upload directory
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            parser: Arc::new(PdfParser::new()),
            chunk_config: ChunkConfig::new(config.rag.chunk_size, config.rag.chunk_overlap),
            upload_dir: config.upload.dir.clone(),
        }
    }

    /// Replace the document parser
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Ingest a PDF into `collection`, replacing any previous contents.
    pub async fn ingest(&self, path: &Path, collection: &str) -> Result<IngestReport> {
        validate_collection_name(collection)?;

        let document = self
            .parser
            .parse(path)
            .map_err(|e| map_parser_error(path, e))?;

        let chunks = chunk_document(&document, &self.chunk_config).map_err(|e| match e {
            ParserError::InvalidChunkConfig(message) => PdfQaError::Validation(message),
            other => map_parser_error(path, other),
        })?;

        if chunks.is_empty() {
            tracing::warn!(file = %document.file_name, "no extractable text in document");
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(PdfQaError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let dimension = self.embedder.dimension();
        self.store.replace_collection(collection, dimension).await?;

        let points: Vec<ChunkPoint> = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(id, (text, vector))| ChunkPoint {
                id: id as u64,
                vector,
                chunk: Chunk::new(text, document.file_name.clone()),
            })
            .collect();
        self.store.upload_points(collection, &points).await?;

        let report = IngestReport {
            collection: collection.to_string(),
            source: document.file_name.clone(),
            page_count: document.page_count(),
            chunk_count: points.len(),
        };

        tracing::info!(
            collection = %report.collection,
            source = %report.source,
            pages = report.page_count,
            chunks = report.chunk_count,
            "document ingested"
        );

        Ok(report)
    }

    /// Ingest a PDF under the collection name derived from its file name
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let collection = collection_name_for_path(path)?;
        self.ingest(path, &collection).await
    }

    /// Store uploaded bytes in the upload directory and ingest them.
    ///
    /// Only the final component of `file_name` is used.
    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<IngestReport> {
        let base = Path::new(file_name)
            .file_name()
            .ok_or_else(|| PdfQaError::Validation(format!("Invalid upload name: {file_name:?}")))?;

        // Derive and check the collection name before touching the disk
        let target = self.upload_dir.join(base);
        collection_name_for_path(&target)?;

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| PdfQaError::Io {
                path: self.upload_dir.clone(),
                source: e,
            })?;
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| PdfQaError::Io {
                path: target.clone(),
                source: e,
            })?;

        tracing::debug!(path = %target.display(), bytes = bytes.len(), "upload saved");
        self.ingest_file(&target).await
    }

    /// PDFs in the upload directory that have no collection yet, sorted
    /// by file name. A missing upload directory has no pending files.
    pub async fn pending_uploads(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PdfQaError::Io {
                    path: self.upload_dir.clone(),
                    source: e,
                })
            }
        };

        let existing: HashSet<String> = self.store.list_collections().await?.into_iter().collect();

        let mut pending = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| PdfQaError::Io {
                path: self.upload_dir.clone(),
                source: e,
            })?;
            let Some(entry) = entry else {
                break;
            };

            let path = entry.path();
            if !path.is_file() || !is_pdf(&path) {
                continue;
            }

            match collection_name_for_path(&path) {
                Ok(name) if existing.contains(&name) => {}
                Ok(_) => pending.push(path),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping upload");
                }
            }
        }

        pending.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(pending)
    }

    /// Ingest every pending upload, one at a time.
    ///
    /// Stops at the first failure.
    pub async fn sync_uploads(&self) -> Result<Vec<IngestReport>> {
        let pending = self.pending_uploads().await?;
        tracing::info!(count = pending.len(), "syncing uploads");

        let mut reports = Vec::with_capacity(pending.len());
        for path in pending {
            reports.push(self.ingest_file(&path).await?);
        }
        Ok(reports)
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn map_parser_error(path: &Path, err: ParserError) -> PdfQaError {
    match err {
        ParserError::IoError { source, .. } => PdfQaError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => PdfQaError::Document {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}
