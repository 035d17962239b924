use tantivy::tokenizer::{LowerCaser, TextAnalyzer, TokenStream, WhitespaceTokenizer};

/// Lowercasing whitespace tokenizer shared by indexing and querying.
///
/// Punctuation stays attached to its word (`"fire,"` and `"fire"` are distinct
/// terms); chunk text is already normalized, so this mostly matters for queries.
#[derive(Clone)]
pub struct Analyzer {
	inner: TextAnalyzer,
}

impl Default for Analyzer {
	fn default() -> Self {
		let inner = TextAnalyzer::builder(WhitespaceTokenizer::default())
			.filter(LowerCaser)
			.build();
		Self { inner }
	}
}

impl Analyzer {
	pub fn tokenize(&self, text: &str) -> Vec<String> {
		// token_stream needs a mutable analyzer
		let mut analyzer = self.inner.clone();
		let mut stream = analyzer.token_stream(text);
		let mut tokens = Vec::new();
		while stream.advance() {
			tokens.push(stream.token().text.clone());
		}
		tokens
	}
}
