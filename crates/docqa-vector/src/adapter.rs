use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use docqa_core::config::VectorSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::{Embedder, VectorStore};
use docqa_core::types::{Chunk, Distance, Payload, SearchResult, StoredPoint};

/// Embeds chunks and queries and keeps them in a single cosine collection.
///
/// Connecting never fails outright: when every attempt errors the index is
/// left unavailable and each operation returns [`Error::Unavailable`].
pub struct VectorIndex {
    store: Option<Box<dyn VectorStore>>,
    embedder: Box<dyn Embedder>,
    collection: String,
    dimension: usize,
    unavailable_reason: Option<String>,
}

impl VectorIndex {
    /// Open a store through `opener` and make sure the collection exists.
    ///
    /// Tries `settings.connect_attempts` times, sleeping
    /// `settings.connect_backoff_ms` between attempts.
    pub fn connect<F>(mut opener: F, embedder: Box<dyn Embedder>, settings: &VectorSettings) -> Self
    where
        F: FnMut() -> Result<Box<dyn VectorStore>>,
    {
        let attempts = settings.connect_attempts.max(1);
        let backoff = Duration::from_millis(settings.connect_backoff_ms);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match opener().and_then(|store| ensure_collection(store, settings.dimension)) {
                Ok(store) => {
                    info!(collection = %settings.collection, attempt, "vector store connected");
                    return Self {
                        store: Some(store),
                        embedder,
                        collection: settings.collection.clone(),
                        dimension: settings.dimension,
                        unavailable_reason: None,
                    };
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "vector store connection failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        thread::sleep(backoff);
                    }
                }
            }
        }

        error!(collection = %settings.collection, "vector store unavailable after {attempts} attempts");
        Self {
            store: None,
            embedder,
            collection: settings.collection.clone(),
            dimension: settings.dimension,
            unavailable_reason: Some(last_error),
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn store(&self) -> Result<&dyn VectorStore> {
        self.store.as_deref().ok_or_else(|| self.unavailable())
    }

    fn store_mut(&mut self) -> Result<&mut Box<dyn VectorStore>> {
        let reason = self.unavailable_reason.clone().unwrap_or_default();
        self.store.as_mut().ok_or(Error::Unavailable(reason))
    }

    fn unavailable(&self) -> Error {
        Error::Unavailable(self.unavailable_reason.clone().unwrap_or_default())
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "dim mismatch: got {} expected {}",
                v.len(),
                self.dimension
            )));
        }
        Ok(vectors)
    }

    /// Embed and store `chunks`, keyed by content id. Returns the number written.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub fn upsert(&mut self, chunks: &[Chunk]) -> Result<usize> {
        self.store()?;
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embed(&texts)?;
        let points: Vec<StoredPoint> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoredPoint { id: chunk.content_id.clone(), vector, payload: Payload::from(chunk) })
            .collect();
        self.store_mut()?.upsert(points)?;
        debug!(written = chunks.len(), "upserted chunks");
        Ok(chunks.len())
    }

    /// The `k` chunks nearest to `query` by cosine similarity, best first.
    pub fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let store = self.store()?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embed(&[query.to_string()])?.remove(0);
        let hits = store.search(&vector, k)?;
        Ok(hits
            .into_iter()
            .map(|(point, score)| SearchResult::new(Chunk::from_payload(&point.payload), score))
            .collect())
    }

    /// Up to `limit` stored chunks in storage order.
    pub fn scan_all(&self, limit: usize) -> Result<Vec<Chunk>> {
        let points = self.store()?.scroll(limit)?;
        Ok(points.iter().map(|p| Chunk::from_payload(&p.payload)).collect())
    }

    pub fn count(&self) -> Result<usize> {
        self.store()?.count()
    }

    /// Drop the collection and recreate it empty.
    pub fn clear(&mut self) -> Result<()> {
        let dimension = self.dimension;
        let store = self.store_mut()?;
        store.delete_collection()?;
        store.create_collection(dimension, Distance::Cosine)?;
        info!(collection = %self.collection, "vector collection cleared");
        Ok(())
    }
}

fn ensure_collection(mut store: Box<dyn VectorStore>, dimension: usize) -> Result<Box<dyn VectorStore>> {
    if !store.collection_exists()? {
        store.create_collection(dimension, Distance::Cosine)?;
        debug!(dimension, "created vector collection");
    }
    Ok(store)
}
