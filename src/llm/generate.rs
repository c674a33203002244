//! Structured (JSON-schema constrained) generation against the configured
//! chat provider. Used by both the normalizer and the re-ranker.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LlmConfig;

/// A generative model that answers with a JSON document matching `schema`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the raw JSON text produced by the model.
    async fn generate_json(&self, system: &str, user: &str, schema: &Value) -> Result<String>;
}

/// `LlmClient` backed by an HTTP provider (Ollama, OpenAI-compatible or Gemini).
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate_json(&self, system: &str, user: &str, schema: &Value) -> Result<String> {
        tracing::debug!(
            "Structured generation via {} ({})",
            self.config.provider,
            self.config.chat_model
        );
        match self.config.provider.as_str() {
            "ollama" => call_ollama(&self.client, &self.config, system, user, schema).await,
            "openai" => call_openai(&self.client, &self.config, system, user, schema).await,
            "gemini" => call_gemini(&self.client, &self.config, system, user, schema).await,
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
    }
}

/// Pull the outermost JSON object out of a model reply. Models sometimes wrap
/// the document in a markdown fence or a sentence even when asked not to.
pub fn extract_json_object(content: &str) -> &str {
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content,
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a Value,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

fn ollama_request<'a>(
    config: &'a LlmConfig,
    system: &'a str,
    user: &'a str,
    schema: &'a Value,
) -> OllamaChatRequest<'a> {
    OllamaChatRequest {
        model: &config.chat_model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        stream: false,
        format: schema,
        options: OllamaOptions { temperature: 0.0 },
    }
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
    schema: &Value,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);
    let req = ollama_request(config, system, user, schema);

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama chat response")?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: Value,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

fn openai_request<'a>(
    config: &'a LlmConfig,
    system: &'a str,
    user: &'a str,
    schema: &'a Value,
) -> OpenAiChatRequest<'a> {
    OpenAiChatRequest {
        model: &config.chat_model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        temperature: 0.0,
        response_format: json!({
            "type": "json_schema",
            "json_schema": {
                "name": "structured_response",
                "schema": schema,
            },
        }),
    }
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
    schema: &Value,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let req = openai_request(config, system, user, schema);

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI chat response")?;
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("OpenAI chat response had no content")
}

// ─── Gemini ──────────────────────────────────────────────

fn gemini_request(system: &str, user: &str, schema: &Value) -> Value {
    json!({
        "system_instruction": {
            "parts": [{ "text": system }],
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": user }],
        }],
        "generationConfig": {
            "temperature": 0.0,
            "responseMimeType": "application/json",
            "responseSchema": gemini_schema(schema),
        },
    })
}

/// Gemini's response schema is an OpenAPI subset: a `["T", "null"]` type union
/// becomes `"type": "T", "nullable": true`.
fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len() + 1);
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("type", Value::Array(types)) => {
                        let mut concrete = types.iter().filter(|t| t.as_str() != Some("null"));
                        if let (Some(ty), None) = (concrete.next(), concrete.next()) {
                            out.insert(key.clone(), ty.clone());
                            if types.len() > 1 {
                                out.insert("nullable".to_string(), Value::Bool(true));
                            }
                        } else {
                            out.insert(key.clone(), value.clone());
                        }
                    }
                    _ => {
                        out.insert(key.clone(), gemini_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}

async fn call_gemini(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
    schema: &Value,
) -> Result<String> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        config.base_url, config.chat_model
    );
    let api_key = config
        .api_key
        .as_deref()
        .context("Gemini provider requires LLM_API_KEY")?;

    let resp = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(&gemini_request(system, user, schema))
        .send()
        .await
        .context("Failed to call Gemini generateContent API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Gemini generateContent API returned {status}: {body}");
    }

    let body: Value = resp
        .json()
        .await
        .context("Failed to parse Gemini response")?;
    body["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
        .context("Gemini response missing candidates[0].content.parts[0].text")
}
