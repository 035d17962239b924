use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::document::{Page, SourceDocument};
use docqa_core::error::{Error, Result};
use docqa_core::traits::VectorStore;
use docqa_core::types::{Chunk, Distance, SearchMode, SearchResult, StoredPoint};
use docqa_embed::HashEmbedder;
use docqa_hybrid::assistant::NO_CONTEXT_ANSWER;
use docqa_hybrid::{
    reciprocal_rank_fusion, AnswerGenerator, Assistant, ChatTurn, ContextDocument, RetrievalEngine, RRF_K,
};
use docqa_text::LexicalState;
use docqa_vector::{MemoryStore, VectorIndex};

fn settings(debug_dir: Option<&Path>) -> Settings {
    let mut s = Settings::default();
    s.vector.snapshot_path = None;
    s.vector.connect_backoff_ms = 0;
    s.data.debug_dir = debug_dir.map(|p| p.to_string_lossy().to_string());
    s
}

fn engine_with(settings: Settings) -> RetrievalEngine {
    let vector = VectorIndex::connect(
        || Ok(Box::new(MemoryStore::new()) as Box<dyn VectorStore>),
        Box::new(HashEmbedder::new(384)),
        &settings.vector,
    );
    let chunker = Chunker::from_settings(&settings.chunking).expect("chunker");
    RetrievalEngine::new(vector, chunker, settings)
}

fn unavailable_engine() -> RetrievalEngine {
    let s = settings(None);
    let vector = VectorIndex::connect(
        || Err(Error::Store("connection refused".to_string())),
        Box::new(HashEmbedder::new(384)),
        &s.vector,
    );
    RetrievalEngine::new(vector, Chunker::default(), s)
}

/// Five single-chunk pages; only the third mentions a heliograph.
fn homestead_manual() -> SourceDocument {
    let texts = [
        "solar panels charge the battery bank during the day",
        "rainwater collects in the cistern below the roof",
        "a heliograph flashes signals across the valley",
        "compost turns kitchen scraps into rich soil",
        "firewood should season for a full year",
    ];
    let pages = texts
        .iter()
        .enumerate()
        .map(|(i, t)| Page { number: i as u32 + 1, text: t.to_string() })
        .collect();
    SourceDocument::new("manual.txt", pages)
}

fn ids(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| r.chunk.content_id.clone()).collect()
}

#[test]
fn keyword_search_finds_unique_term() {
    let mut engine = engine_with(settings(None));
    assert_eq!(engine.ingest(&homestead_manual()), 5);
    assert_eq!(engine.lexical_state(), LexicalState::Ready);

    let hits = engine.retrieve("heliograph", SearchMode::Keyword, 1);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.sequence_index, 2);
    assert_eq!(hits[0].chunk.page_number, 3);

    let hybrid = engine.retrieve("heliograph", SearchMode::Hybrid, 3);
    assert!(hybrid.iter().any(|r| r.chunk.sequence_index == 2));
}

#[test]
fn keyword_without_lexical_index_matches_semantic() {
    let mut s = settings(None);
    // a zero scan leaves the lexical index empty while the store has data
    s.lexical.scan_limit = 0;
    let mut engine = engine_with(s);
    engine.ingest(&homestead_manual());
    assert_eq!(engine.lexical_state(), LexicalState::Empty);

    let keyword = engine.retrieve("battery bank", SearchMode::Keyword, 3);
    let semantic = engine.retrieve("battery bank", SearchMode::Semantic, 3);
    assert!(!semantic.is_empty());
    assert_eq!(ids(&keyword), ids(&semantic));
}

#[test]
fn hybrid_results_are_bounded_and_distinct() {
    let mut engine = engine_with(settings(None));
    engine.ingest(&homestead_manual());
    for k in 1..=4 {
        let hits = engine.retrieve("soil and water", SearchMode::Hybrid, k);
        assert!(hits.len() <= k);
        let distinct: HashSet<String> = ids(&hits).into_iter().collect();
        assert_eq!(distinct.len(), hits.len());
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn empty_corpus_returns_nothing() {
    let engine = engine_with(settings(None));
    assert_eq!(engine.lexical_state(), LexicalState::Empty);
    for mode in [SearchMode::Semantic, SearchMode::Keyword, SearchMode::Hybrid] {
        assert!(engine.retrieve("anything", mode, 5).is_empty());
    }
}

#[test]
fn unavailable_store_degrades_to_empty() {
    let mut engine = unavailable_engine();
    assert!(!engine.is_available());
    assert_eq!(engine.lexical_state(), LexicalState::Unbuilt);
    for mode in [SearchMode::Semantic, SearchMode::Keyword, SearchMode::Hybrid] {
        assert!(engine.retrieve("battery", mode, 5).is_empty());
    }
    assert_eq!(engine.ingest(&homestead_manual()), 0);
    let stats = engine.stats();
    assert_eq!(stats.total_chunks, 0);
    assert!(!stats.has_data);
    assert!(matches!(engine.clear_all(), Err(Error::Unavailable(_))));
}

#[test]
fn reingesting_is_idempotent() {
    let mut engine = engine_with(settings(None));
    engine.ingest(&homestead_manual());
    let before = engine.stats();
    let first = ids(&engine.retrieve("cistern", SearchMode::Keyword, 5));

    engine.ingest(&homestead_manual());
    let after = engine.stats();
    assert_eq!(before.total_chunks, 5);
    assert_eq!(after.total_chunks, 5);
    assert_eq!(ids(&engine.retrieve("cistern", SearchMode::Keyword, 5)), first);
}

#[test]
fn empty_document_touches_nothing() {
    let mut engine = engine_with(settings(None));
    assert_eq!(engine.ingest(&SourceDocument::from_text("blank.txt", "  \n\n ")), 0);
    assert_eq!(engine.stats().total_chunks, 0);
}

#[test]
fn stats_list_distinct_sources() {
    let mut engine = engine_with(settings(None));
    engine.ingest(&homestead_manual());
    engine.ingest(&SourceDocument::from_text("bees.md", "hive inspections happen weekly"));
    let stats = engine.stats();
    assert_eq!(stats.total_chunks, 6);
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.document_names, vec!["bees.md", "manual.txt"]);
    assert!(stats.has_data);
}

#[test]
fn stats_names_cover_only_the_scanned_chunks() {
    let mut s = settings(None);
    s.lexical.scan_limit = 5;
    let mut engine = engine_with(s);
    engine.ingest(&homestead_manual());
    engine.ingest(&SourceDocument::from_text("bees.md", "hive inspections happen weekly"));
    let stats = engine.stats();
    assert_eq!(stats.total_chunks, 6);
    assert_eq!(stats.document_names, vec!["manual.txt"]);
}

#[test]
fn debug_export_and_clear() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let debug_dir = tmp.path().join("debug");
    let mut engine = engine_with(settings(Some(&debug_dir)));
    engine.ingest(&homestead_manual());

    let dump = debug_dir.join("manual.txt_chunks.json");
    let rows: serde_json::Value = serde_json::from_str(&fs::read_to_string(&dump)?)?;
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["chunk_id"], 1);
    assert_eq!(rows[4]["chunk_id"], 5);
    assert_eq!(rows[2]["metadata"]["source"], "manual.txt");
    assert_eq!(rows[2]["metadata"]["page"], 3);

    engine.clear_all()?;
    assert!(!dump.exists());
    assert!(debug_dir.exists());
    assert_eq!(engine.stats().total_chunks, 0);
    assert_eq!(engine.lexical_state(), LexicalState::Empty);
    assert!(engine.retrieve("heliograph", SearchMode::Keyword, 3).is_empty());
    Ok(())
}

/// Memory store whose collection cannot be recreated once it has been deleted.
struct NoRecreateStore {
    inner: MemoryStore,
    deleted: bool,
}

impl VectorStore for NoRecreateStore {
    fn collection_exists(&self) -> Result<bool> {
        self.inner.collection_exists()
    }

    fn create_collection(&mut self, dim: usize, distance: Distance) -> Result<()> {
        if self.deleted {
            return Err(Error::Store("disk full".to_string()));
        }
        self.inner.create_collection(dim, distance)
    }

    fn upsert(&mut self, points: Vec<StoredPoint>) -> Result<()> {
        self.inner.upsert(points)
    }

    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(StoredPoint, f32)>> {
        self.inner.search(vector, k)
    }

    fn scroll(&self, limit: usize) -> Result<Vec<StoredPoint>> {
        self.inner.scroll(limit)
    }

    fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    fn delete_collection(&mut self) -> Result<()> {
        self.deleted = true;
        self.inner.delete_collection()
    }
}

#[test]
fn failed_clear_still_drops_lexical_index() {
    let s = settings(None);
    let vector = VectorIndex::connect(
        || Ok(Box::new(NoRecreateStore { inner: MemoryStore::new(), deleted: false }) as Box<dyn VectorStore>),
        Box::new(HashEmbedder::new(384)),
        &s.vector,
    );
    let mut engine = RetrievalEngine::new(vector, Chunker::default(), s);
    engine.ingest(&homestead_manual());
    assert_eq!(engine.retrieve("heliograph", SearchMode::Keyword, 3).len(), 3);

    assert!(matches!(engine.clear_all(), Err(Error::Store(_))));
    assert_eq!(engine.lexical_state(), LexicalState::Unbuilt);
    assert!(engine.retrieve("heliograph", SearchMode::Keyword, 3).is_empty());
}

#[test]
fn ingest_dir_continues_past_bad_files() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    fs::write(tmp.path().join("a.txt"), "goats need fresh hay\u{0C}and clean water daily")?;
    fs::write(tmp.path().join("b.txt"), [0xffu8, 0xfe, 0xfd])?;
    fs::write(tmp.path().join("c.md"), "chickens roost at dusk")?;
    fs::write(tmp.path().join("skip.pdf"), "not scanned")?;

    let mut engine = engine_with(settings(None));
    let report = engine.ingest_dir(tmp.path());
    assert_eq!(report.documents.len(), 3);
    assert_eq!(report.processed(), 2);
    assert_eq!(report.total_chunks(), 3);
    assert_eq!(report.documents[1].1, 0, "invalid UTF-8 is skipped");
    Ok(())
}

fn result(text: &str) -> SearchResult {
    SearchResult::new(Chunk::new(text.to_string(), "doc.txt", 1, 0), 1.0)
}

#[test]
fn fusion_of_nothing_is_nothing() {
    assert!(reciprocal_rank_fusion(&[], &[], RRF_K).is_empty());
}

#[test]
fn fusion_tie_keeps_first_list_first() {
    let fused = reciprocal_rank_fusion(&[result("A")], &[result("B")], RRF_K);
    let order: Vec<&str> = fused.iter().map(|r| r.chunk.content.as_str()).collect();
    assert_eq!(order, ["A", "B"]);
    assert_eq!(fused[0].score, fused[1].score);
}

#[test]
fn fusion_of_disjoint_lists_interleaves_by_rank() {
    let a = [result("A1"), result("A2")];
    let b = [result("B1"), result("B2")];
    let fused = reciprocal_rank_fusion(&a, &b, RRF_K);
    let order: Vec<&str> = fused.iter().map(|r| r.chunk.content.as_str()).collect();
    assert_eq!(order, ["A1", "B1", "A2", "B2"]);
    assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-7);
    assert!((fused[2].score - 1.0 / 62.0).abs() < 1e-7);
}

#[test]
fn fusion_sums_shared_items() {
    let fused = reciprocal_rank_fusion(&[result("X"), result("Y")], &[result("Y")], RRF_K);
    assert_eq!(fused[0].chunk.content, "Y");
    assert!((fused[0].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-7);
}

struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    calls: Cell<usize>,
    history_seen: RefCell<Vec<ChatTurn>>,
}

impl ScriptedGenerator {
    fn replying(text: &str) -> Self {
        Self { reply: Ok(text.to_string()), calls: Cell::new(0), history_seen: RefCell::new(Vec::new()) }
    }

    fn failing(message: &str) -> Self {
        Self { reply: Err(message.to_string()), calls: Cell::new(0), history_seen: RefCell::new(Vec::new()) }
    }
}

impl AnswerGenerator for ScriptedGenerator {
    fn generate(&self, _query: &str, _context: &[ContextDocument], history: &[ChatTurn]) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        *self.history_seen.borrow_mut() = history.to_vec();
        self.reply.clone().map_err(Error::Unavailable)
    }
}

#[test]
fn assistant_without_context_skips_generator() {
    let engine = engine_with(settings(None));
    let assistant = Assistant::new(ScriptedGenerator::replying("unused"));
    let answer = assistant.ask(&engine, "where is the well?", SearchMode::Hybrid, 5, &[]);
    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(assistant.generator().calls.get(), 0);
}

#[test]
fn assistant_answers_from_retrieved_chunks() {
    let mut engine = engine_with(settings(None));
    engine.ingest(&homestead_manual());
    let generator = ScriptedGenerator::replying("  Season it for a year.\n");

    let assistant = Assistant::new(generator);
    let answer = assistant.ask(&engine, "firewood", SearchMode::Keyword, 2, &[]);
    assert_eq!(answer.text, "Season it for a year.");
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0].source, "manual.txt");
    assert_eq!(answer.sources[0].page, 5);
}

#[test]
fn assistant_passes_last_three_turns() {
    let generator = ScriptedGenerator::replying("ok");
    let history: Vec<ChatTurn> = (0..5).map(|i| ChatTurn::user(&format!("turn {i}"))).collect();
    let context = vec![ContextDocument { source: "a.txt".into(), page: 1, content: "x".into() }];

    let assistant = Assistant::new(generator);
    assistant.answer("q", context, &history);
    let g = assistant.generator();
    assert_eq!(g.calls.get(), 1);
    let seen: Vec<String> = g.history_seen.borrow().iter().map(|t| t.content.clone()).collect();
    assert_eq!(seen, ["turn 2", "turn 3", "turn 4"]);
}

#[test]
fn assistant_reports_generator_errors_with_sources() {
    let context = vec![ContextDocument { source: "a.txt".into(), page: 4, content: "x".into() }];
    let assistant = Assistant::new(ScriptedGenerator::failing("model offline"));
    let answer = assistant.answer("q", context.clone(), &[]);
    assert!(answer.text.contains("model offline"));
    assert_eq!(answer.sources, context);
}
