//! PDF Q&A RAG - Retrieval-Augmented Generation pipeline
//!
//! This crate wires the three pipeline stages together:
//! - Ingestion: PDF pages are chunked, embedded and stored in one
//!   collection per document (see [`ingest`])
//! - Retrieval: the question is embedded once and the selected
//!   collections are searched one after another; hits are merged by
//!   score and truncated to `top_k`
//! - Synthesis: the merged hits are formatted into a single prompt and
//!   sent to the configured LLM as one user message
//!
//! All stages run sequentially; each call awaits the previous one.

use std::sync::Arc;

use pdfqa_core::{Hit, LlmClient, MissingCollectionPolicy, PdfQaError, RagConfig, Result};
use pdfqa_vector::{EmbeddingClient, VectorStore};
use thiserror::Error;

pub mod ingest;
pub mod llm;

pub use ingest::{IngestReport, Ingestor};
pub use llm::{create_llm_client, ChatCompletionsClient, OllamaClient};

// ============================================================================
// Query Guard
// ============================================================================

/// Reasons a question is not sent through the pipeline.
///
/// These are user-facing warnings, not pipeline errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWarning {
    #[error("Please enter a question.")]
    EmptyQuestion,

    #[error("Please select at least one PDF collection.")]
    NoCollections,
}

/// Check that a question can be answered.
///
/// The question must contain non-whitespace text and at least one
/// collection must be selected.
pub fn check_query(question: &str, collections: &[String]) -> std::result::Result<(), QueryWarning> {
    if question.trim().is_empty() {
        return Err(QueryWarning::EmptyQuestion);
    }
    if collections.is_empty() {
        return Err(QueryWarning::NoCollections);
    }
    Ok(())
}

// ============================================================================
// Prompt Builder
// ============================================================================

/// Separator placed between excerpts in the prompt context
pub const EXCERPT_SEPARATOR: &str = "\n---\n";

/// Render hits as `[source] text` excerpts joined by [`EXCERPT_SEPARATOR`]
pub fn format_context(hits: &[Hit]) -> String {
    hits.iter()
        .map(|hit| format!("[{}] {}", hit.chunk.source, hit.chunk.text))
        .collect::<Vec<_>>()
        .join(EXCERPT_SEPARATOR)
}

/// Builder for the answer-synthesis prompt
#[derive(Debug, Default, Clone)]
pub struct PromptBuilder {
    question: String,
    excerpts: Vec<Hit>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the question
    pub fn question(mut self, q: impl Into<String>) -> Self {
        self.question = q.into();
        self
    }

    /// Add retrieved hits, best first
    pub fn excerpts(mut self, hits: &[Hit]) -> Self {
        self.excerpts.extend_from_slice(hits);
        self
    }

    /// Build the final prompt
    pub fn build(self) -> String {
        let context = format_context(&self.excerpts);

        let mut prompt = String::new();
        prompt.push('\n');
        prompt.push_str(
            "You are an intelligent PDF assistant. \
             Answer the following question using the information below.\n\n",
        );
        prompt.push_str(&format!("Question: {}\n\n", self.question));
        prompt.push_str("Relevant excerpts:\n");
        prompt.push_str(&context);
        prompt.push_str("\n\n");
        prompt.push_str(
            "Provide a clear, complete and well-explained answer. \
             If multiple points are relevant, summarize them all.\n",
        );
        prompt
    }
}

// ============================================================================
// RAG Orchestrator
// ============================================================================

/// A generated answer and the hits it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Raw completion text
    pub text: String,

    /// Hits placed in the prompt, best first
    pub hits: Vec<Hit>,
}

impl Answer {
    /// Distinct source file names of the hits, in rank order
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for hit in &self.hits {
            if !sources.contains(&hit.chunk.source.as_str()) {
                sources.push(&hit.chunk.source);
            }
        }
        sources
    }
}

/// Result of [`PdfQa::ask`]
#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    /// The question went through retrieval and synthesis
    Answered(Answer),

    /// The guard rejected the question; nothing was called
    Rejected(QueryWarning),
}

/// Question-answering orchestrator over ingested PDF collections
pub struct PdfQa {
    /// Vector store holding one collection per document
    store: Arc<dyn VectorStore>,

    /// Sentence-embedding model
    embedder: Arc<dyn EmbeddingClient>,

    /// LLM client
    llm: Arc<dyn LlmClient>,

    /// Configuration
    config: RagConfig,
}

impl PdfQa {
    /// Create a new orchestrator
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        config: RagConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            config,
        }
    }

    /// Override the number of hits used per question (at least one)
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k.max(1);
        self
    }

    /// Override the missing-collection policy
    pub fn with_missing_collection_policy(mut self, policy: MissingCollectionPolicy) -> Self {
        self.config.missing_collection = policy;
        self
    }

    /// Retrieve the `top_k` best hits for a question across collections.
    ///
    /// The question is embedded once. Each collection is searched for its
    /// own `top_k` nearest neighbours, then all hits are merged, sorted by
    /// descending score and truncated.
    pub async fn retrieve(
        &self,
        question: &str,
        collections: &[String],
        top_k: usize,
    ) -> Result<Vec<Hit>> {
        if top_k == 0 || collections.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(question).await?;

        let mut all_hits = Vec::new();
        for name in collections {
            if !self.store.collection_exists(name).await? {
                match self.config.missing_collection {
                    MissingCollectionPolicy::Fail => {
                        return Err(PdfQaError::CollectionNotFound(name.clone()));
                    }
                    MissingCollectionPolicy::Skip => {
                        tracing::warn!(collection = %name, "skipping missing collection");
                        continue;
                    }
                }
            }

            let hits = self.store.search(name, &vector, top_k).await?;
            tracing::debug!(collection = %name, hits = hits.len(), "collection searched");
            all_hits.extend(hits);
        }

        Ok(pdfqa_core::rank_hits(all_hits, top_k))
    }

    /// Generate an answer from already retrieved hits
    pub async fn synthesize(&self, question: &str, hits: Vec<Hit>) -> Result<Answer> {
        let prompt = PromptBuilder::new()
            .question(question)
            .excerpts(&hits)
            .build();

        tracing::info!(
            model = self.llm.model(),
            prompt_chars = prompt.len(),
            excerpts = hits.len(),
            "calling LLM"
        );
        let text = self.llm.generate(&prompt).await?;
        tracing::info!(answer_chars = text.len(), "LLM response received");

        Ok(Answer { text, hits })
    }

    /// Answer a question from the selected collections.
    ///
    /// Blank questions and empty selections are rejected before any
    /// embedding, store or LLM call.
    pub async fn ask(&self, question: &str, collections: &[String]) -> Result<AskOutcome> {
        if let Err(warning) = check_query(question, collections) {
            tracing::warn!(%warning, "question rejected");
            return Ok(AskOutcome::Rejected(warning));
        }

        let hits = self
            .retrieve(question, collections, self.config.top_k)
            .await?;
        let answer = self.synthesize(question, hits).await?;
        Ok(AskOutcome::Answered(answer))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pdfqa_core::Chunk;

    fn hit(text: &str, source: &str, score: f32) -> Hit {
        Hit {
            chunk: Chunk::new(text, source),
            score,
            collection: "doc".to_string(),
        }
    }

    #[test]
    fn test_check_query() {
        let selected = vec!["report".to_string()];
        assert_eq!(check_query("What?", &selected), Ok(()));
        assert_eq!(check_query("   \n", &selected), Err(QueryWarning::EmptyQuestion));
        assert_eq!(check_query("What?", &[]), Err(QueryWarning::NoCollections));
        // Question is checked first
        assert_eq!(check_query("", &[]), Err(QueryWarning::EmptyQuestion));
    }

    #[test]
    fn test_format_context() {
        let hits = vec![
            hit("Paris is the capital.", "france.pdf", 0.9),
            hit("Berlin is the capital.", "germany.pdf", 0.5),
        ];
        assert_eq!(
            format_context(&hits),
            "[france.pdf] Paris is the capital.\n---\n[germany.pdf] Berlin is the capital."
        );
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = PromptBuilder::new()
            .question("What is the capital of France?")
            .excerpts(&[hit("The capital of France is Paris.", "france.pdf", 1.0)])
            .build();

        let expected = "\nYou are an intelligent PDF assistant. Answer the following question using the information below.\n\n\
                        Question: What is the capital of France?\n\n\
                        Relevant excerpts:\n\
                        [france.pdf] The capital of France is Paris.\n\n\
                        Provide a clear, complete and well-explained answer. If multiple points are relevant, summarize them all.\n";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_answer_sources_are_distinct() {
        let answer = Answer {
            text: String::new(),
            hits: vec![
                hit("a", "one.pdf", 0.9),
                hit("b", "two.pdf", 0.8),
                hit("c", "one.pdf", 0.7),
            ],
        };
        assert_eq!(answer.sources(), vec!["one.pdf", "two.pdf"]);
    }
}
