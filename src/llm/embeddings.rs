use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::models::NormalizedLog;

/// Maximum characters to send to the embedding API. Normalized logs are
/// short, but a verbose error summary or stack trace in an extra field can
/// push dense text past an 8k-token context.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Turns a normalized log into a vector for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, log: &NormalizedLog) -> Result<Vec<f32>>;
}

/// `Embedder` backed by the configured HTTP provider.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, log: &NormalizedLog) -> Result<Vec<f32>> {
        let text = log.embedding_text();
        let embedding = embed_single(&self.client, &self.config, &text).await?;
        check_embedding(&embedding, self.config.embedding_dim)?;
        Ok(embedding)
    }
}

/// Reject vectors that would poison cosine search. A zero vector has no
/// direction, and a dimension mismatch never scores against the corpus.
fn check_embedding(embedding: &[f32], expected_dim: usize) -> Result<()> {
    if embedding.is_empty() {
        anyhow::bail!("Embedding provider returned an empty vector");
    }
    if embedding.iter().all(|v| *v == 0.0) {
        anyhow::bail!("Embedding provider returned a zero vector");
    }
    if expected_dim > 0 && embedding.len() != expected_dim {
        anyhow::bail!(
            "Embedding dimension mismatch: expected {expected_dim}, got {}",
            embedding.len()
        );
    }
    Ok(())
}

/// Generate an embedding for a single text.
pub async fn embed_single(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let input = truncate_for_embedding(text).to_string();

    let results = match config.provider.as_str() {
        "ollama" => embed_ollama(client, config, input).await?,
        "openai" => embed_openai(client, config, input).await?,
        "gemini" => embed_gemini(client, config, input).await?,
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    };

    results
        .into_iter()
        .next()
        .context("No embedding returned")
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to truncate over-long inputs instead of returning 400.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: String,
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url);

    let req = OllamaEmbedRequest {
        model: config.embedding_model.clone(),
        input: vec![text],
        truncate: true,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama embed API returned {status}: {body}");
    }

    let body: OllamaEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama embed response")?;

    Ok(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: String,
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiEmbedRequest {
        model: config.embedding_model.clone(),
        input: vec![text],
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI embed API returned {status}: {body}");
    }

    let body: OpenAiEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI embed response")?;

    Ok(body.data.into_iter().map(|d| d.embedding).collect())
}

// ─── Gemini ──────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiEmbedRequest {
    content: GeminiContent,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiEmbedding,
}

#[derive(Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

async fn embed_gemini(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: String,
) -> Result<Vec<Vec<f32>>> {
    let url = format!(
        "{}/v1beta/models/{}:embedContent",
        config.base_url, config.embedding_model
    );
    let api_key = config
        .api_key
        .as_deref()
        .context("Gemini provider requires LLM_API_KEY")?;

    let req = GeminiEmbedRequest {
        content: GeminiContent {
            parts: vec![GeminiPart { text }],
        },
    };

    let resp = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(&req)
        .send()
        .await
        .context("Failed to call Gemini embedContent API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Gemini embedContent API returned {status}: {body}");
    }

    let body: GeminiEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse Gemini embed response")?;

    Ok(vec![body.embedding.values])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(truncate_for_embedding("ORA-00001"), "ORA-00001");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes; after a one-byte prefix the limit lands mid-char
        let text = format!("a{}", "é".repeat(1_500));
        let out = truncate_for_embedding(&text);
        assert!(out.len() <= MAX_EMBED_CHARS);
        assert!(out.len() >= MAX_EMBED_CHARS - 1);
        assert!(text.starts_with(out));
    }

    #[test]
    fn test_check_embedding_rejects_empty_and_zero() {
        assert!(check_embedding(&[], 0).is_err());
        assert!(check_embedding(&[0.0, 0.0, 0.0], 3).is_err());
        assert!(check_embedding(&[0.1, 0.0, 0.2], 3).is_ok());
    }

    #[test]
    fn test_check_embedding_dimension() {
        assert!(check_embedding(&[0.1, 0.2], 3).is_err());
        // 0 disables the dimension check
        assert!(check_embedding(&[0.1, 0.2], 0).is_ok());
    }

    #[tokio::test]
    async fn test_gemini_without_api_key_fails_before_sending() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            api_key: None,
            ..LlmConfig::default()
        };
        let err = embed_single(&reqwest::Client::new(), &config, "text")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("LLM_API_KEY"));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_error() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let err = embed_single(&reqwest::Client::new(), &config, "text")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
