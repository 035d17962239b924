//! docqa-hybrid
//!
//! Combines dense and lexical retrieval. [`RetrievalEngine`] owns both indexes
//! and the chunker, handles ingestion and clearing, and answers queries in
//! semantic, keyword or hybrid mode; hybrid results are merged with reciprocal
//! rank fusion. [`Assistant`] turns retrieved chunks into an answer through an
//! [`AnswerGenerator`].
pub mod assistant;
pub mod engine;
pub mod export;
pub mod fusion;

pub use assistant::{render_prompt, Answer, AnswerGenerator, Assistant, ChatTurn, ContextDocument, Role};
pub use engine::{CorpusStats, IngestReport, RetrievalEngine};
pub use fusion::{reciprocal_rank_fusion, RRF_K};
