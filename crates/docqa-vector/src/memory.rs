use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::traits::VectorStore;
use docqa_core::types::{ContentId, Distance, StoredPoint};

#[derive(Serialize, Deserialize)]
struct Snapshot {
    dimension: usize,
    distance: Distance,
    points: Vec<StoredPoint>,
}

struct Collection {
    dimension: usize,
    points: Vec<StoredPoint>,
    positions: HashMap<ContentId, usize>,
}

impl Collection {
    fn new(dimension: usize) -> Self {
        Self { dimension, points: Vec::new(), positions: HashMap::new() }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut collection = Self::new(snapshot.dimension);
        collection.insert_all(snapshot.points);
        collection
    }

    /// Overwrite in place when the id exists, append otherwise.
    fn insert_all(&mut self, points: Vec<StoredPoint>) {
        for point in points {
            match self.positions.get(&point.id) {
                Some(&pos) => self.points[pos] = point,
                None => {
                    self.positions.insert(point.id.clone(), self.points.len());
                    self.points.push(point);
                }
            }
        }
    }
}

/// In-process vector store with exact cosine search.
///
/// With a snapshot path the collection is loaded on open and rewritten after
/// every mutation, so the corpus survives restarts.
pub struct MemoryStore {
    collection: Option<Collection>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// A store that lives only as long as the process.
    pub fn new() -> Self {
        Self { collection: None, snapshot: None }
    }

    /// Open a store persisted at `path`; a missing file means no collection yet.
    pub fn open(path: &Path) -> Result<Self> {
        let collection = if path.exists() {
            let bytes = fs::read(path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            debug!(path = %path.display(), points = snapshot.points.len(), "loaded vector snapshot");
            Some(Collection::from_snapshot(snapshot))
        } else {
            None
        };
        Ok(Self { collection, snapshot: Some(path.to_path_buf()) })
    }

    fn collection(&self) -> Result<&Collection> {
        self.collection
            .as_ref()
            .ok_or_else(|| Error::NotFound("collection does not exist".to_string()))
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        match &self.collection {
            Some(c) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let snapshot = Snapshot { dimension: c.dimension, distance: Distance::Cosine, points: c.points.clone() };
                fs::write(path, serde_json::to_vec(&snapshot)?)?;
            }
            None => {
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore for MemoryStore {
    fn collection_exists(&self) -> Result<bool> {
        Ok(self.collection.is_some())
    }

    fn create_collection(&mut self, dim: usize, _distance: Distance) -> Result<()> {
        if self.collection.is_none() {
            self.collection = Some(Collection::new(dim));
            self.persist()?;
        }
        Ok(())
    }

    fn upsert(&mut self, points: Vec<StoredPoint>) -> Result<()> {
        let collection = self
            .collection
            .as_mut()
            .ok_or_else(|| Error::NotFound("collection does not exist".to_string()))?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.dimension) {
            return Err(Error::Store(format!(
                "point {} has {} dimensions, collection expects {}",
                bad.id,
                bad.vector.len(),
                collection.dimension
            )));
        }
        collection.insert_all(points);
        self.persist()
    }

    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(StoredPoint, f32)>> {
        let collection = self.collection()?;
        let mut scored: Vec<(usize, f32)> = collection
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, cosine(vector, &p.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| (collection.points[i].clone(), score))
            .collect())
    }

    fn scroll(&self, limit: usize) -> Result<Vec<StoredPoint>> {
        Ok(self.collection()?.points.iter().take(limit).cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.collection()?.points.len())
    }

    fn delete_collection(&mut self) -> Result<()> {
        self.collection = None;
        self.persist()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
