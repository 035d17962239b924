use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::document::{list_documents, SourceDocument};
use docqa_core::error::Result;
use docqa_core::types::{SearchMode, SearchResult};
use docqa_text::{Bm25Params, LexicalIndex, LexicalState};
use docqa_vector::VectorIndex;

use crate::export;
use crate::fusion::reciprocal_rank_fusion;

/// Snapshot of what the corpus holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub total_chunks: usize,
    pub total_documents: usize,
    /// Distinct sources among the scanned chunks, sorted. Only the first
    /// `lexical.scan_limit` chunks are scanned, so on a larger corpus this
    /// list can miss sources that `total_chunks` still counts.
    pub document_names: Vec<String>,
    pub has_data: bool,
}

/// Chunks written per file by [`RetrievalEngine::ingest_dir`]; failed files count 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: Vec<(PathBuf, usize)>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.documents.iter().map(|(_, n)| n).sum()
    }

    /// Files that produced at least one chunk.
    pub fn processed(&self) -> usize {
        self.documents.iter().filter(|(_, n)| *n > 0).count()
    }
}

/// Hybrid retrieval over one document collection.
///
/// The vector index is the source of truth; the lexical index is derived from
/// it and rebuilt after every ingestion and clear. Mutations take `&mut self`,
/// so a rebuild always finishes before the next query sees the index.
pub struct RetrievalEngine {
    vector: VectorIndex,
    lexical: LexicalIndex,
    chunker: Chunker,
    settings: Settings,
}

impl RetrievalEngine {
    /// Build the engine and index whatever the store already holds.
    pub fn new(vector: VectorIndex, chunker: Chunker, settings: Settings) -> Self {
        let lexical = LexicalIndex::new(Bm25Params::from(&settings.lexical));
        let mut engine = Self { vector, lexical, chunker, settings };
        engine.rebuild_lexical();
        engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_available(&self) -> bool {
        self.vector.is_available()
    }

    pub fn lexical_state(&self) -> LexicalState {
        self.lexical.state()
    }

    /// Top `k` chunks for `query`. Failures of either engine yield fewer or no
    /// results, never an error.
    #[instrument(skip(self, query))]
    pub fn retrieve(&self, query: &str, mode: SearchMode, k: usize) -> Vec<SearchResult> {
        if !self.vector.is_available() {
            warn!("vector store unavailable, returning no results");
            return Vec::new();
        }
        let results = match mode {
            SearchMode::Semantic => self.semantic(query, k),
            SearchMode::Keyword => self.keyword(query, k),
            SearchMode::Hybrid => self.hybrid(query, k),
        };
        debug!(hits = results.len(), "retrieved");
        results
    }

    fn semantic(&self, query: &str, k: usize) -> Vec<SearchResult> {
        match self.vector.similarity_search(query, k) {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "semantic search failed");
                Vec::new()
            }
        }
    }

    fn keyword(&self, query: &str, k: usize) -> Vec<SearchResult> {
        if !self.lexical.is_ready() {
            debug!(state = ?self.lexical.state(), "lexical index not ready, falling back to semantic");
            return self.semantic(query, k);
        }
        self.lexical.query(query, k)
    }

    fn hybrid(&self, query: &str, k: usize) -> Vec<SearchResult> {
        let fetch = k.saturating_mul(2);
        let semantic = self.semantic(query, fetch);
        let keyword = self.keyword(query, fetch);
        if semantic.is_empty() && keyword.is_empty() {
            return Vec::new();
        }
        let mut fused = reciprocal_rank_fusion(&semantic, &keyword, self.settings.retrieval.rrf_k);
        fused.truncate(k);
        fused
    }

    /// Chunk, embed and store `document`, then rebuild the lexical index.
    /// Returns the number of chunks written; 0 on any failure.
    #[instrument(skip_all, fields(source = %document.source_id))]
    pub fn ingest(&mut self, document: &SourceDocument) -> usize {
        let chunks = self.chunker.split(document);
        if chunks.is_empty() {
            warn!("document produced no chunks");
            return 0;
        }
        let written = match self.vector.upsert(&chunks) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to store chunks");
                return 0;
            }
        };

        if let Some(dir) = &self.settings.data.debug_dir {
            match export::write_chunks(Path::new(dir), &document.source_id, &chunks) {
                Ok(path) => debug!(path = %path.display(), "exported chunks"),
                Err(e) => warn!(error = %e, "chunk export failed"),
            }
        }

        self.rebuild_lexical();
        info!(chunks = written, "ingested document");
        written
    }

    /// Load and ingest one file; unreadable or malformed files give 0.
    pub fn ingest_path(&mut self, path: &Path) -> usize {
        match SourceDocument::load(path) {
            Ok(document) => self.ingest(&document),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping document");
                0
            }
        }
    }

    /// Ingest every supported file under `dir` in sorted order.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn ingest_dir(&mut self, dir: &Path) -> IngestReport {
        let files = list_documents(dir);
        if files.is_empty() {
            info!("no documents found");
        }
        let mut report = IngestReport::default();
        for path in files {
            let n = self.ingest_path(&path);
            report.documents.push((path, n));
        }
        info!(processed = report.processed(), chunks = report.total_chunks(), "directory ingested");
        report
    }

    /// Drop every stored chunk and debug dump; the lexical index ends up empty.
    ///
    /// The lexical index is rebuilt even when the store fails part-way, so
    /// keyword search never serves chunks the store may already have dropped.
    #[instrument(skip_all)]
    pub fn clear_all(&mut self) -> Result<()> {
        if let Err(e) = self.vector.clear() {
            warn!(error = %e, "vector clear failed");
            self.rebuild_lexical();
            return Err(e);
        }
        if let Some(dir) = &self.settings.data.debug_dir {
            if let Err(e) = export::wipe(Path::new(dir)) {
                warn!(error = %e, "could not wipe debug exports");
            }
        }
        self.rebuild_lexical();
        info!("corpus cleared");
        Ok(())
    }

    pub fn stats(&self) -> CorpusStats {
        let total_chunks = match self.vector.count() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "stats unavailable");
                return CorpusStats::default();
            }
        };
        let limit = self.settings.lexical.scan_limit;
        if total_chunks > limit {
            warn!(total = total_chunks, limit, "corpus exceeds scan limit, document names cover the first {limit} chunks only");
        }
        let names: BTreeSet<String> = match self.vector.scan_all(limit) {
            Ok(chunks) => chunks.into_iter().map(|c| c.source_id).collect(),
            Err(e) => {
                warn!(error = %e, "could not list documents");
                BTreeSet::new()
            }
        };
        CorpusStats {
            total_chunks,
            total_documents: names.len(),
            document_names: names.into_iter().collect(),
            has_data: total_chunks > 0,
        }
    }

    /// Rebuild the lexical index from a full scan of the vector store.
    ///
    /// The scan reads at most `lexical.scan_limit` chunks; anything beyond is
    /// invisible to keyword search. On failure the index is left unbuilt.
    #[instrument(skip_all)]
    pub fn rebuild_lexical(&mut self) {
        let limit = self.settings.lexical.scan_limit;
        match self.vector.scan_all(limit) {
            Ok(chunks) => {
                if let Ok(total) = self.vector.count() {
                    if total > limit {
                        warn!(total, limit, "corpus exceeds scan limit, keyword search covers the first {limit} chunks only");
                    }
                }
                self.lexical.build(chunks);
                debug!(state = ?self.lexical.state(), chunks = self.lexical.len(), "lexical index rebuilt");
            }
            Err(e) => {
                warn!(error = %e, "lexical rebuild failed");
                self.lexical.reset();
            }
        }
    }
}
