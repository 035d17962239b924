use crate::error::Result;
use crate::types::{Distance, StoredPoint};

/// Text to fixed-length, L2-normalized vector.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A single-collection nearest-neighbour store.
///
/// Mirrors the operations the retrieval core needs from an external vector
/// database; implementations decide where points actually live.
pub trait VectorStore: Send + Sync {
    fn collection_exists(&self) -> Result<bool>;
    fn create_collection(&mut self, dim: usize, distance: Distance) -> Result<()>;
    /// Insert or overwrite points by id.
    fn upsert(&mut self, points: Vec<StoredPoint>) -> Result<()>;
    /// The `k` nearest points to `vector`, best first, with similarity scores.
    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(StoredPoint, f32)>>;
    /// Up to `limit` stored points in storage order.
    fn scroll(&self, limit: usize) -> Result<Vec<StoredPoint>>;
    fn count(&self) -> Result<usize>;
    fn delete_collection(&mut self) -> Result<()>;
}
