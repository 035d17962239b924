//! Recursive character chunking.
//!
//! Each page is normalized and then cut into pieces of at most `size`
//! characters, preferring paragraph breaks, then line breaks, then spaces, and
//! only then a hard cut between characters. Neighbouring chunks share up to
//! `overlap` characters. Lengths are counted in chars, not bytes.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::ChunkingSettings;
use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::text::normalize;
use crate::types::Chunk;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { size: CHUNK_SIZE, overlap: CHUNK_OVERLAP }
    }
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".to_string()));
        }
        if overlap >= size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.size, settings.overlap)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk every page of `document`, numbering chunks across the whole document.
    pub fn split(&self, document: &SourceDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            let text = normalize(&page.text);
            for piece in self.split_text(&text) {
                let sequence_index = chunks.len();
                chunks.push(Chunk::new(piece, &document.source_id, page.number, sequence_index));
            }
        }
        debug!(source = %document.source_id, pages = document.pages.len(), chunks = chunks.len(), "split document");
        chunks
    }

    /// Split already-normalized text into overlapping pieces.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = *candidate;
                break;
            }
            if text.contains(*candidate) {
                separator = *candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut out = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split_recursive(&piece, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting));
        }
        out
    }

    /// Greedily pack pieces into windows of at most `size` chars, carrying up
    /// to `overlap` chars of trailing pieces into the next window.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.size && !window.is_empty() {
                if let Some(joined) = join_trimmed(&window) {
                    merged.push(joined);
                }
                while total > self.overlap || (total + len > self.size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece.as_str());
            total += len;
        }
        if let Some(joined) = join_trimmed(&window) {
            merged.push(joined);
        }
        merged
    }
}

/// Split on `separator`, re-attaching it to the start of each following piece.
/// The empty separator splits into single characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut parts = text.split(separator);
    let mut pieces: Vec<String> = parts.next().map(str::to_string).into_iter().collect();
    pieces.extend(parts.map(|p| format!("{separator}{p}")));
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_trimmed(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
