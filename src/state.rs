use std::sync::Arc;

use crate::config::Config;
use crate::llm::embeddings::HttpEmbedder;
use crate::llm::generate::{HttpLlmClient, LlmClient};
use crate::llm::normalize::LlmNormalizer;
use crate::search::pipeline::SearchPipeline;
use crate::search::vector::VectorStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<SearchPipeline>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let vectors = VectorStore::open_or_create(&config.vector_dir())?;
        tracing::info!("Loaded {} known logs", vectors.len());

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let llm: Arc<dyn LlmClient> =
            Arc::new(HttpLlmClient::new(http_client.clone(), config.llm.clone()));

        let mut pipeline = SearchPipeline::new(
            Arc::new(LlmNormalizer::new(llm.clone())),
            Arc::new(HttpEmbedder::new(http_client, config.llm.clone())),
            Arc::new(vectors),
        );
        if config.pipeline.rerank_enabled {
            pipeline = pipeline.with_reranker(llm);
        }

        Ok(Self::with_pipeline(config, pipeline))
    }

    /// State around an already assembled pipeline.
    pub fn with_pipeline(config: Config, pipeline: SearchPipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }
}
