//! Domain types shared by the lexical and vector engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hex fingerprint of a chunk's content. Doubles as the vector store key.
pub type ContentId = String;

/// Fingerprint `content` with blake3.
///
/// Depends on the text only, so the same span cut from two documents maps to
/// the same id and the later upsert wins.
pub fn content_id(content: &str) -> ContentId {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// A bounded span of normalized document text; the unit of retrieval.
///
/// - `content`: normalized text of the chunk
/// - `source_id`: originating document (file name)
/// - `page_number`: 1-based page within the source
/// - `sequence_index`: 0-based position in the document's chunk sequence
/// - `content_id`: fingerprint of `content`, see [`content_id`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_id: String,
    pub page_number: u32,
    pub sequence_index: usize,
    pub content_id: ContentId,
}

impl Chunk {
    pub fn new(content: String, source_id: &str, page_number: u32, sequence_index: usize) -> Self {
        let content_id = content_id(&content);
        Self { content, source_id: source_id.to_string(), page_number, sequence_index, content_id }
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source_id.clone(),
            page: self.page_number,
            chunk_index: self.sequence_index,
        }
    }

    /// Rebuild a chunk from a stored payload. The id is recomputed from the
    /// content rather than trusted from storage.
    pub fn from_payload(payload: &Payload) -> Self {
        Self::new(
            payload.content.clone(),
            &payload.metadata.source,
            payload.metadata.page,
            payload.metadata.chunk_index,
        )
    }
}

/// Chunk metadata as persisted next to its vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
}

/// Payload stored with every vector: the text plus its metadata, never the raw vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl From<&Chunk> for Payload {
    fn from(chunk: &Chunk) -> Self {
        Self { content: chunk.content.clone(), metadata: chunk.metadata() }
    }
}

/// A point in the vector store, keyed by `content_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: ContentId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// Distance function of a vector collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
}

/// A chunk paired with an engine-specific score. Higher is always better;
/// scores from different modes are only comparable after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

impl SearchResult {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// Which engines a query runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    Keyword,
    #[default]
    Hybrid,
}

impl SearchMode {
    /// Lenient parse: anything unrecognised selects [`SearchMode::Hybrid`].
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for SearchMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "keyword" => Ok(Self::Keyword),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(crate::Error::InvalidConfig(format!("unknown search mode '{other}'"))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}
