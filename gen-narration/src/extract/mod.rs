//! Source text extraction from documents and web pages.

pub mod docx;
pub mod web;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use web::fetch_article;

/// Document types accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Docx,
    Text,
}

impl SourceKind {
    /// Anything that is not a PDF or DOCX is read as UTF-8 text.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            _ => Self::Text,
        }
    }
}

/// Extract text from one file.
pub fn extract_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let text = match SourceKind::from_path(path) {
        SourceKind::Pdf => pdf_extract::extract_text_from_mem(&bytes)
            .with_context(|| format!("Failed to extract text from PDF {}", path.display()))?,
        SourceKind::Docx => docx::extract_docx(&bytes)
            .with_context(|| format!("Failed to extract text from DOCX {}", path.display()))?,
        SourceKind::Text => String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8 text", path.display()))?,
    };

    log::debug!("extracted {} chars from {}", text.chars().count(), path.display());
    Ok(text)
}

/// Combined text of several uploaded files.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Text of every readable file, in the given order, separated by newlines
    pub text: String,
    /// Files that could not be read, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

/// Extract and join the text of all files. Unreadable files are recorded in
/// `failures` and skipped.
pub fn extract_files(paths: &[PathBuf]) -> Extraction {
    let mut texts = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();

    for path in paths {
        match extract_file(path) {
            Ok(text) => texts.push(text),
            Err(e) => {
                log::warn!("{:#}", e);
                failures.push((path.clone(), format!("{:#}", e)));
            }
        }
    }

    Extraction {
        text: texts.join("\n"),
        failures,
    }
}
