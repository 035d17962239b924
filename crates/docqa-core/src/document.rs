//! Source documents handed to the chunker.
//!
//! Documents are plain UTF-8 text; a form feed (`\x0C`) starts a new page, the
//! same convention text extractors use when flattening paged formats.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const PAGE_BREAK: char = '\u{0C}';

/// File extensions picked up when scanning a directory.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_id: String,
    pub pages: Vec<Page>,
}

impl SourceDocument {
    pub fn new(source_id: &str, pages: Vec<Page>) -> Self {
        Self { source_id: source_id.to_string(), pages }
    }

    /// Split `text` into pages on form feeds.
    pub fn from_text(source_id: &str, text: &str) -> Self {
        let pages = text
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(i, page)| Page { number: i as u32 + 1, text: page.to_string() })
            .collect();
        Self::new(source_id, pages)
    }

    /// Decode raw bytes. Invalid UTF-8 is treated as a malformed document.
    pub fn from_bytes(source_id: &str, bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Document(format!("{source_id}: not valid UTF-8 ({e})")))?;
        Ok(Self::from_text(source_id, text))
    }

    /// Read a document from disk; its file name becomes the source id.
    pub fn load(path: &Path) -> Result<Self> {
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Document(format!("{} has no file name", path.display())))?;
        let bytes = fs::read(path)
            .map_err(|e| Error::Document(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&source_id, &bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// All supported files under `root`, sorted for a stable ingestion order.
pub fn list_documents(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_supported(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}
