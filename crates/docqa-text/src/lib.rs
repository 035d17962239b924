//! docqa-text
//!
//! Sparse lexical retrieval: a BM25 Okapi index over chunk text, tokenized with
//! a tantivy analyzer. The index lives in memory and is rebuilt wholesale from
//! the vector store whenever the corpus changes.
pub mod analyzer;
pub mod bm25;

pub use analyzer::Analyzer;
pub use bm25::{Bm25Params, LexicalIndex, LexicalState};
