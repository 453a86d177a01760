use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{PageText, SourceDocument};
use crate::error::{RagError, Result};

/// Load a document from disk as page text.
///
/// PDFs are extracted page by page with 0-based page numbers. Plain text and
/// markdown files become a single page with no page number.
pub fn load_document(path: &Path) -> Result<SourceDocument> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let source = path.to_string_lossy().to_string();

    match extension.as_str() {
        "pdf" => load_pdf(path, source),
        "txt" | "md" => {
            let text = fs::read_to_string(path)?;
            Ok(SourceDocument::from_text(source, text))
        }
        _ => Err(RagError::Input(format!("Unsupported file type: {}", source))),
    }
}

fn load_pdf(path: &Path, source: String) -> Result<SourceDocument> {
    if !path.is_file() {
        return Err(RagError::Input(format!("File not found: {}", source)));
    }

    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| RagError::Input(format!("Failed to extract PDF text from {}: {}", source, e)))?;

    tracing::debug!(source = %source, pages = pages.len(), "Extracted PDF text");

    let pages = pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText {
            page_number: Some(i as u32),
            text,
        })
        .collect();

    Ok(SourceDocument::new(source, pages))
}

/// Every `*.pdf` below `dir`, in path order.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::Input(format!(
            "Not a directory: {}",
            dir.to_string_lossy()
        )));
    }

    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();

    found.sort();
    Ok(found)
}
