use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::llm::embeddings::Embedder;
use crate::llm::generate::LlmClient;
use crate::llm::normalize::Normalizer;
use crate::llm::rerank::rerank;
use crate::models::{Candidate, LogRecord};
use crate::search::format::format_candidate;
use crate::search::vector::{StoredLog, VectorSearch};

/// Duplicate detection pipeline: normalize → embed → vector search →
/// format → LLM re-rank. Stages run one after another; nothing is shared
/// between requests except the corpus behind `index`.
pub struct SearchPipeline {
    normalizer: Arc<dyn Normalizer>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorSearch>,
    reranker: Option<Arc<dyn LlmClient>>,
}

impl SearchPipeline {
    pub fn new(
        normalizer: Arc<dyn Normalizer>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorSearch>,
    ) -> Self {
        Self {
            normalizer,
            embedder,
            index,
            reranker: None,
        }
    }

    /// Enable the LLM re-rank stage.
    pub fn with_reranker(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.reranker = Some(llm);
        self
    }

    pub fn index(&self) -> &dyn VectorSearch {
        self.index.as_ref()
    }

    /// Find the `top_n` tickets most likely to be duplicates of `raw_log`.
    ///
    /// Fails if normalization, embedding or the vector search fails. A failed
    /// re-rank is not an error: the similarity order is returned instead.
    pub async fn search_log(&self, raw_log: &[LogRecord], top_n: usize) -> Result<Vec<Candidate>> {
        self.run_search(raw_log, top_n).await.inspect_err(|e| {
            tracing::error!("Search pipeline failed: {e:#}");
        })
    }

    async fn run_search(&self, raw_log: &[LogRecord], top_n: usize) -> Result<Vec<Candidate>> {
        // ── Step 1: Normalize ────────────────────────────────
        tracing::info!("Normalizing query log ({} records)", raw_log.len());
        let normalized = self.normalizer.normalize(raw_log).await?;

        // ── Step 2: Embed ────────────────────────────────────
        tracing::info!("Generating query embedding");
        let embedding = self.embedder.embed(&normalized).await?;

        // ── Step 3: Vector search ────────────────────────────
        tracing::info!("Searching for top-{top_n} similar logs");
        let hits = self.index.search(&embedding, top_n).await?;

        // ── Step 4: Format ───────────────────────────────────
        let candidates: Vec<Candidate> = hits.into_iter().map(format_candidate).collect();

        // ── Step 5: Re-rank ──────────────────────────────────
        let mut results = match &self.reranker {
            Some(llm) => rerank(llm.as_ref(), &normalized, candidates).await,
            None => candidates,
        };
        results.truncate(top_n);

        tracing::info!("Search complete: {} matches", results.len());
        Ok(results)
    }

    /// Add a log to the corpus under `jira_id`. Returns the stored entry id.
    pub async fn ingest_log(&self, jira_id: &str, raw_log: &[LogRecord]) -> Result<Uuid> {
        self.run_ingest(jira_id, raw_log).await.inspect_err(|e| {
            tracing::error!("Ingest pipeline failed for {jira_id}: {e:#}");
        })
    }

    async fn run_ingest(&self, jira_id: &str, raw_log: &[LogRecord]) -> Result<Uuid> {
        tracing::info!("Normalizing log for {jira_id}");
        let normalized = self.normalizer.normalize(raw_log).await?;

        tracing::info!("Generating embedding for {jira_id}");
        let embedding = self.embedder.embed(&normalized).await?;

        let stored = StoredLog::new(jira_id, &normalized, embedding)?;
        let id = stored.id;
        self.index.insert(stored).await?;

        tracing::info!("Stored {jira_id} as {id}");
        Ok(id)
    }
}
