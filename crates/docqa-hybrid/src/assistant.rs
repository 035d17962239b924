//! Question answering on top of retrieval.
//!
//! The language model itself is a collaborator behind [`AnswerGenerator`];
//! this module decides what it sees and how its failures surface.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{info, warn};

use docqa_core::error::Result;
use docqa_core::types::{SearchMode, SearchResult};

use crate::engine::RetrievalEngine;

/// Answer returned when retrieval finds nothing; the generator is not called.
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any relevant information in the documents to answer this question.";

/// How many of the most recent conversation turns reach the generator.
pub const HISTORY_TURNS: usize = 3;

/// A retrieved chunk as shown to the generator and cited back to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub source: String,
    pub page: u32,
    pub content: String,
}

impl ContextDocument {
    /// `"<source> (page <n>)"`
    pub fn reference(&self) -> String {
        format!("{} (page {})", self.source, self.page)
    }
}

impl From<&SearchResult> for ContextDocument {
    fn from(result: &SearchResult) -> Self {
        Self {
            source: result.chunk.source_id.clone(),
            page: result.chunk.page_number,
            content: result.chunk.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: &str) -> Self {
        Self { role: Role::User, content: content.to_string() }
    }

    pub fn assistant(content: &str) -> Self {
        Self { role: Role::Assistant, content: content.to_string() }
    }
}

/// Produces answer text from a question, its context and recent history.
pub trait AnswerGenerator {
    fn generate(&self, query: &str, context: &[ContextDocument], history: &[ChatTurn]) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ContextDocument>,
}

pub struct Assistant<G> {
    generator: G,
}

impl<G: AnswerGenerator> Assistant<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Retrieve context for `query` and answer from it.
    pub fn ask(
        &self,
        engine: &RetrievalEngine,
        query: &str,
        mode: SearchMode,
        k: usize,
        history: &[ChatTurn],
    ) -> Answer {
        let results = engine.retrieve(query, mode, k);
        let context: Vec<ContextDocument> = results.iter().map(ContextDocument::from).collect();
        self.answer(query, context, history)
    }

    /// Answer from an already-assembled context, in rank order.
    pub fn answer(&self, query: &str, context: Vec<ContextDocument>, history: &[ChatTurn]) -> Answer {
        if context.is_empty() {
            return Answer { text: NO_CONTEXT_ANSWER.to_string(), sources: Vec::new() };
        }
        let recent = &history[history.len().saturating_sub(HISTORY_TURNS)..];
        match self.generator.generate(query, &context, recent) {
            Ok(text) => {
                info!(sources = context.len(), "answer generated");
                Answer { text: text.trim().to_string(), sources: context }
            }
            Err(e) => {
                warn!(error = %e, "answer generation failed");
                Answer {
                    text: format!("Sorry, an error occurred while generating the answer: {e}"),
                    sources: context,
                }
            }
        }
    }
}

/// Render the prompt a text-completion model would receive.
///
/// Context documents are numbered from 1 and cite their source and page; the
/// history section is omitted when there is no history.
pub fn render_prompt(query: &str, context: &[ContextDocument], history: &[ChatTurn]) -> String {
    let mut prompt = String::from("You are a helpful assistant.\n\n");
    if !history.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for turn in history {
            let role = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let _ = writeln!(prompt, "{role}: {}", turn.content);
        }
        prompt.push('\n');
    }
    prompt.push_str("Information from the documents:\n");
    let parts: Vec<String> = context
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[Document {}] {}:\n{}", i + 1, doc.reference(), doc.content))
        .collect();
    prompt.push_str(&parts.join("\n\n"));
    let _ = write!(
        prompt,
        "\n\nQuestion: {query}\n\n\
         Instructions:\n\
         1. Answer only from the documents provided\n\
         2. When the information is found, cite the document name and page\n\
         3. When it is not found, say so plainly\n\
         4. Keep the answer clear and concise\n\n\
         Answer:"
    );
    prompt
}
