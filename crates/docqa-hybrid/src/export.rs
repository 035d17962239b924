//! Per-document chunk dumps for inspecting what was indexed.
//!
//! Written to `<dir>/<source>_chunks.json` as a pretty JSON array. Nothing in
//! the retrieval path reads them back.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use docqa_core::error::Result;
use docqa_core::types::{Chunk, ContentId};

#[derive(Debug, Serialize)]
struct ExportedChunk<'a> {
    /// 1-based position in the document.
    chunk_id: usize,
    content: &'a str,
    metadata: ExportedMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct ExportedMetadata<'a> {
    source: &'a str,
    page: u32,
    chunk_index: usize,
    content_id: &'a ContentId,
}

pub fn export_path(dir: &Path, source_id: &str) -> PathBuf {
    dir.join(format!("{source_id}_chunks.json"))
}

/// Write the chunk dump for `source_id`, creating `dir` if needed.
pub fn write_chunks(dir: &Path, source_id: &str, chunks: &[Chunk]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let rows: Vec<ExportedChunk<'_>> = chunks
        .iter()
        .enumerate()
        .map(|(i, c)| ExportedChunk {
            chunk_id: i + 1,
            content: &c.content,
            metadata: ExportedMetadata {
                source: &c.source_id,
                page: c.page_number,
                chunk_index: c.sequence_index,
                content_id: &c.content_id,
            },
        })
        .collect();
    let path = export_path(dir, source_id);
    fs::write(&path, serde_json::to_string_pretty(&rows)?)?;
    Ok(path)
}

/// Remove every dump and leave `dir` empty.
pub fn wipe(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
