use std::cell::Cell;

use docqa_core::config::VectorSettings;
use docqa_core::error::Error;
use docqa_core::traits::VectorStore;
use docqa_core::types::Chunk;
use docqa_embed::HashEmbedder;
use docqa_vector::{MemoryStore, VectorIndex};
use tempfile::TempDir;

fn settings() -> VectorSettings {
    VectorSettings { connect_backoff_ms: 0, snapshot_path: None, ..VectorSettings::default() }
}

fn memory_index() -> VectorIndex {
    VectorIndex::connect(
        || Ok(Box::new(MemoryStore::new()) as Box<dyn VectorStore>),
        Box::new(HashEmbedder::new(384)),
        &settings(),
    )
}

fn chunks(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk::new(t.to_string(), "guide.txt", 1, i))
        .collect()
}

#[test]
fn upsert_is_idempotent_by_content() -> anyhow::Result<()> {
    let mut index = memory_index();
    let batch = chunks(&["purify water by boiling", "store grain in sealed bins"]);
    assert_eq!(index.upsert(&batch)?, 2);
    assert_eq!(index.upsert(&batch)?, 2);
    assert_eq!(index.count()?, 2);

    let ids: Vec<String> = index.scan_all(1000)?.into_iter().map(|c| c.content_id).collect();
    let expected: Vec<String> = batch.iter().map(|c| c.content_id.clone()).collect();
    assert_eq!(ids, expected);
    Ok(())
}

#[test]
fn similarity_search_prefers_shared_words() -> anyhow::Result<()> {
    let mut index = memory_index();
    index.upsert(&chunks(&[
        "split firewood with a maul",
        "boil water for a full minute",
        "patch a canvas tarp",
    ]))?;
    let hits = index.similarity_search("how long to boil water", 2)?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.content, "boil water for a full minute");
    assert!(hits[0].score >= hits[1].score);
    Ok(())
}

#[test]
fn clear_leaves_empty_collection() -> anyhow::Result<()> {
    let mut index = memory_index();
    index.upsert(&chunks(&["one", "two"]))?;
    index.clear()?;
    assert_eq!(index.count()?, 0);
    assert!(index.scan_all(10)?.is_empty());
    Ok(())
}

#[test]
fn connect_retries_then_degrades() {
    let attempts = Cell::new(0u32);
    let index = VectorIndex::connect(
        || {
            attempts.set(attempts.get() + 1);
            Err(Error::Store("connection refused".to_string()))
        },
        Box::new(HashEmbedder::new(384)),
        &settings(),
    );
    assert_eq!(attempts.get(), 3);
    assert!(!index.is_available());
    assert!(matches!(index.count(), Err(Error::Unavailable(_))));
    assert!(matches!(index.similarity_search("q", 3), Err(Error::Unavailable(_))));
    assert!(matches!(index.scan_all(10), Err(Error::Unavailable(_))));
}

#[test]
fn connect_succeeds_on_later_attempt() {
    let attempts = Cell::new(0u32);
    let index = VectorIndex::connect(
        || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 2 {
                return Err(Error::Store("warming up".to_string()));
            }
            Ok(Box::new(MemoryStore::new()) as Box<dyn VectorStore>)
        },
        Box::new(HashEmbedder::new(384)),
        &settings(),
    );
    assert_eq!(attempts.get(), 2);
    assert!(index.is_available());
    assert_eq!(index.count().ok(), Some(0));
}

#[test]
fn mismatched_embedding_dimension_is_rejected() {
    let mut index = VectorIndex::connect(
        || Ok(Box::new(MemoryStore::new()) as Box<dyn VectorStore>),
        Box::new(HashEmbedder::new(16)),
        &settings(),
    );
    let err = index.upsert(&chunks(&["short vectors"])).unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
}

#[test]
fn snapshot_survives_reopen() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let path = tmp.path().join("store/rag_documents.json");
    let open = || -> docqa_core::Result<Box<dyn VectorStore>> { Ok(Box::new(MemoryStore::open(&path)?)) };

    let mut index = VectorIndex::connect(open, Box::new(HashEmbedder::new(384)), &settings());
    index.upsert(&chunks(&["persisted chunk"]))?;
    drop(index);

    let reopened = VectorIndex::connect(open, Box::new(HashEmbedder::new(384)), &settings());
    let restored = reopened.scan_all(10)?;
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].content, "persisted chunk");
    assert_eq!(restored[0].source_id, "guide.txt");
    Ok(())
}
