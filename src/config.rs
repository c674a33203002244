use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the log corpus is persisted
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Search pipeline tuning
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama", "openai" or "gemini"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for normalization and re-ranking
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

/// Knobs for the search pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Result count used when the caller does not pass `top_n`.
    pub default_top_n: usize,
    /// Upper bound applied to caller-supplied `top_n`.
    pub max_top_n: usize,
    /// When false, vector-similarity order is returned as-is.
    pub rerank_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_top_n: 5,
            max_top_n: 50,
            rerank_enabled: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unparseable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("LOGLENS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("LOGLENS_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider.to_lowercase();
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(model) = lookup("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(dim) = lookup("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        if let Some(val) = lookup("LOGLENS_DEFAULT_TOP_N") {
            if let Ok(v) = val.parse::<usize>() {
                if v > 0 {
                    config.pipeline.default_top_n = v;
                }
            }
        }
        if let Some(val) = lookup("LOGLENS_MAX_TOP_N") {
            if let Ok(v) = val.parse::<usize>() {
                if v > 0 {
                    config.pipeline.max_top_n = v;
                }
            }
        }
        if let Some(val) = lookup("LOGLENS_RERANK_ENABLED") {
            if let Ok(v) = val.parse() {
                config.pipeline.rerank_enabled = v;
            }
        }

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}
