use std::collections::HashMap;

use tracing::{debug, instrument};

use docqa_core::config::LexicalSettings;
use docqa_core::types::{Chunk, SearchResult};

use crate::analyzer::Analyzer;

/// Okapi BM25 tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
	/// Negative IDFs are replaced by `epsilon * average_idf`.
	pub epsilon: f32,
}

impl Default for Bm25Params {
	fn default() -> Self {
		Self { k1: 1.5, b: 0.75, epsilon: 0.25 }
	}
}

impl From<&LexicalSettings> for Bm25Params {
	fn from(s: &LexicalSettings) -> Self {
		Self { k1: s.k1, b: s.b, epsilon: s.epsilon }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalState {
	/// Never built, or the last rebuild failed.
	Unbuilt,
	/// Built from zero chunks.
	Empty,
	Ready,
}

struct Corpus {
	chunks: Vec<Chunk>,
	term_freqs: Vec<HashMap<String, u32>>,
	doc_lens: Vec<f32>,
	avg_doc_len: f32,
	idf: HashMap<String, f32>,
}

enum Inner {
	Unbuilt,
	Empty,
	Ready(Corpus),
}

/// In-memory BM25 index over a snapshot of chunks.
pub struct LexicalIndex {
	params: Bm25Params,
	analyzer: Analyzer,
	inner: Inner,
}

impl Default for LexicalIndex {
	fn default() -> Self {
		Self::new(Bm25Params::default())
	}
}

impl LexicalIndex {
	pub fn new(params: Bm25Params) -> Self {
		Self { params, analyzer: Analyzer::default(), inner: Inner::Unbuilt }
	}

	/// Replace the whole index with one built from `chunks`.
	#[instrument(skip_all, fields(chunks = chunks.len()))]
	pub fn build(&mut self, chunks: Vec<Chunk>) {
		if chunks.is_empty() {
			debug!("lexical index built empty");
			self.inner = Inner::Empty;
			return;
		}

		let mut term_freqs = Vec::with_capacity(chunks.len());
		let mut doc_lens = Vec::with_capacity(chunks.len());
		let mut doc_freq: HashMap<String, u32> = HashMap::new();
		for chunk in &chunks {
			let tokens = self.analyzer.tokenize(&chunk.content);
			doc_lens.push(tokens.len() as f32);
			let mut tf: HashMap<String, u32> = HashMap::new();
			for t in tokens {
				*tf.entry(t).or_insert(0) += 1;
			}
			for term in tf.keys() {
				*doc_freq.entry(term.clone()).or_insert(0) += 1;
			}
			term_freqs.push(tf);
		}

		let n = chunks.len() as f32;
		let avg_doc_len = doc_lens.iter().sum::<f32>() / n;

		let mut idf: HashMap<String, f32> = HashMap::with_capacity(doc_freq.len());
		let mut idf_sum = 0.0f32;
		let mut negative = Vec::new();
		for (term, df) in doc_freq {
			let df = df as f32;
			let value = ((n - df + 0.5) / (df + 0.5)).ln();
			idf_sum += value;
			if value < 0.0 {
				negative.push(term.clone());
			}
			idf.insert(term, value);
		}
		if !idf.is_empty() {
			let floor = self.params.epsilon * idf_sum / idf.len() as f32;
			for term in negative {
				idf.insert(term, floor);
			}
		}

		debug!(terms = idf.len(), avg_doc_len, "lexical index built");
		self.inner = Inner::Ready(Corpus { chunks, term_freqs, doc_lens, avg_doc_len, idf });
	}

	/// Drop the index back to [`LexicalState::Unbuilt`].
	pub fn reset(&mut self) {
		self.inner = Inner::Unbuilt;
	}

	pub fn state(&self) -> LexicalState {
		match self.inner {
			Inner::Unbuilt => LexicalState::Unbuilt,
			Inner::Empty => LexicalState::Empty,
			Inner::Ready(_) => LexicalState::Ready,
		}
	}

	pub fn is_ready(&self) -> bool {
		self.state() == LexicalState::Ready
	}

	/// Number of indexed chunks.
	pub fn len(&self) -> usize {
		match &self.inner {
			Inner::Ready(c) => c.chunks.len(),
			_ => 0,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Top `k` chunks by BM25 score, best first.
	///
	/// Every indexed chunk is scored, so chunks sharing no term with the query
	/// still fill the tail with score 0. Equal scores keep corpus order.
	pub fn query(&self, text: &str, k: usize) -> Vec<SearchResult> {
		let Inner::Ready(corpus) = &self.inner else {
			return Vec::new();
		};
		let terms = self.analyzer.tokenize(text);
		let mut scored: Vec<(usize, f32)> = (0..corpus.chunks.len())
			.map(|i| (i, self.score(corpus, i, &terms)))
			.collect();
		scored.sort_by(|a, b| b.1.total_cmp(&a.1));
		scored
			.into_iter()
			.take(k)
			.map(|(i, score)| SearchResult::new(corpus.chunks[i].clone(), score))
			.collect()
	}

	fn score(&self, corpus: &Corpus, doc: usize, terms: &[String]) -> f32 {
		let Bm25Params { k1, b, .. } = self.params;
		let len_norm = if corpus.avg_doc_len > 0.0 { corpus.doc_lens[doc] / corpus.avg_doc_len } else { 0.0 };
		let tf = &corpus.term_freqs[doc];
		terms
			.iter()
			.map(|t| {
				let f = tf.get(t).copied().unwrap_or(0) as f32;
				let idf = corpus.idf.get(t).copied().unwrap_or(0.0);
				idf * (f * (k1 + 1.0)) / (f + k1 * (1.0 - b + b * len_norm))
			})
			.sum()
	}
}
