//! PDF document parser using pdf-extract
//!
//! Extracts text content page by page from PDF files.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::{DocumentParser, ParsedDocument, ParserError, Result};

/// The `%PDF-` marker may be preceded by junk within the first kilobyte
const HEADER_SEARCH_WINDOW: usize = 1024;

/// PDF document parser
#[derive(Debug, Default, Clone)]
pub struct PdfParser;

impl PdfParser {
    /// Create a new PDF parser
    pub fn new() -> Self {
        Self
    }

    /// Extract page texts from in-memory PDF bytes
    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        if !has_pdf_header(bytes) {
            return Err(ParserError::CorruptedFile(
                "missing %PDF header".to_string(),
            ));
        }

        // pdf-extract panics on some malformed inputs instead of returning an error
        catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }))
        .map_err(|_| ParserError::CorruptedFile("PDF extractor aborted".to_string()))?
        .map_err(|e| ParserError::PdfError(e.to_string()))
    }
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let pages = self.extract_pages(&bytes).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "PDF extraction failed");
            e
        })?;

        let doc = pages
            .into_iter()
            .fold(ParsedDocument::new(path), |doc, text| doc.with_page(text));

        tracing::debug!(
            path = %path.display(),
            pages = doc.page_count(),
            chars = doc.char_count(),
            "PDF parsed"
        );

        Ok(doc)
    }
}
