//! Collection naming
//!
//! Every ingested document lives in its own vector-store collection whose
//! name is derived from the document's file name.

use std::path::Path;

use crate::{PdfQaError, Result};

/// Maximum collection name length accepted by the vector store
pub const MAX_COLLECTION_NAME_LEN: usize = 255;

/// Derive a collection name from a file name.
///
/// Lowercases, replaces spaces with underscores and strips trailing
/// `.pdf` suffixes. `"My Report.pdf"` becomes `"my_report"`.
pub fn derive_collection_name(file_name: &str) -> String {
    let name = file_name.to_lowercase().replace(' ', "_");
    let mut stem = name.as_str();
    while let Some(rest) = stem.strip_suffix(".pdf") {
        stem = rest;
    }
    stem.to_string()
}

/// Derive a collection name from the last component of a path
pub fn collection_name_for_path(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PdfQaError::Validation(format!("Path has no usable file name: {}", path.display()))
        })?;

    let name = derive_collection_name(file_name);
    validate_collection_name(&name)?;
    Ok(name)
}

/// Check that a name is usable as a vector-store collection identifier
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PdfQaError::Validation(
            "Collection name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(PdfQaError::Validation(format!(
            "Collection name exceeds {MAX_COLLECTION_NAME_LEN} bytes: {name}"
        )));
    }

    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(PdfQaError::Validation(format!(
            "Collection name contains invalid characters: {name:?}"
        )));
    }

    Ok(())
}
