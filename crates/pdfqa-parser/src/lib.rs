//! PDF Q&A Parser - Document text extraction and chunking
//!
//! Extracts page-level text from PDF files and splits it into overlapping
//! fixed-window chunks ready for embedding. Splitting itself is delegated to
//! the `text-splitter` crate.

use std::path::Path;
use text_splitter::{ChunkConfig as SplitterConfig, TextSplitter};
use thiserror::Error;

pub mod pdf;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use pdf::PdfParser;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document parsing
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// File is corrupted or malformed
    #[error("File is corrupted or malformed: {0}")]
    CorruptedFile(String),

    /// Chunk window settings are unusable
    #[error("Invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub number: u32,

    /// Extracted text
    pub text: String,
}

/// A parsed document with page-level text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Original file path
    pub file_path: String,

    /// File name used as the chunk source tag
    pub file_name: String,

    /// Pages in document order
    pub pages: Vec<PageText>,
}

impl ParsedDocument {
    /// Create an empty parsed document for a path
    pub fn new(path: &Path) -> Self {
        Self {
            file_path: path.display().to_string(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            pages: Vec::new(),
        }
    }

    /// Add a page
    pub fn with_page(mut self, text: impl Into<String>) -> Self {
        let number = self.pages.len() as u32 + 1;
        self.pages.push(PageText {
            number,
            text: text.into(),
        });
        self
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Get total character count
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

// ============================================================================
// Chunking
// ============================================================================

/// Configuration for document chunking
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    pub overlap: usize,
}

impl ChunkConfig {
    /// Create a chunk configuration
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk content
    pub content: String,

    /// Chunk index within the document
    pub index: u32,

    /// Page the chunk was cut from
    pub page: u32,
}

/// Chunk a parsed document page by page.
///
/// Chunks never span page boundaries. Indices are sequential across the
/// whole document. Whitespace-only pages produce no chunks.
pub fn chunk_document(doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<TextChunk>> {
    if config.chunk_size == 0 {
        return Err(ParserError::InvalidChunkConfig(
            "chunk size must be positive".to_string(),
        ));
    }
    if config.overlap >= config.chunk_size {
        return Err(ParserError::InvalidChunkConfig(format!(
            "overlap {} must be smaller than chunk size {}",
            config.overlap, config.chunk_size
        )));
    }

    let splitter_config = SplitterConfig::new(config.chunk_size)
        .with_overlap(config.overlap)
        .map_err(|e| ParserError::InvalidChunkConfig(e.to_string()))?;
    let splitter = TextSplitter::new(splitter_config);

    let mut chunks = Vec::new();
    let mut index = 0u32;

    for page in &doc.pages {
        for piece in splitter.chunks(&page.text) {
            if piece.trim().is_empty() {
                continue;
            }
            chunks.push(TextChunk {
                content: piece.to_string(),
                index,
                page: page.number,
            });
            index += 1;
        }
    }

    tracing::debug!(
        file = %doc.file_name,
        pages = doc.page_count(),
        chunks = chunks.len(),
        "document chunked"
    );

    Ok(chunks)
}

// ============================================================================
// Tests
// ============================================================================
