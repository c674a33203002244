use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::generate::{extract_json_object, LlmClient};
use crate::models::{LogRecord, NormalizedLog};

/// Turns an unprocessed log into its canonical structured form.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, raw_log: &[LogRecord]) -> Result<NormalizedLog>;
}

const SYSTEM_PROMPT: &str = "You normalize integration error logs so that recurrences of the same \
failure look identical. From the raw log records, extract:\n\
- flow_code: the integration or flow identifier, without version suffixes\n\
- trigger_type: what started the run (SCHEDULE, REST, SOAP, EVENT, ...)\n\
- error_code: the most specific error code present\n\
- error_summary: one or two sentences describing the root error, with instance-specific \
values (timestamps, instance ids, record keys, hostnames) replaced by placeholders such as <ID>\n\
- failed_step: the step or activity that failed, if named\n\
- endpoint: the target system or endpoint, if named\n\
Use null for anything that is not present. Respond with ONLY the JSON object.";

fn normalized_log_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "flow_code": { "type": ["string", "null"] },
            "trigger_type": { "type": ["string", "null"] },
            "error_code": { "type": ["string", "null"] },
            "error_summary": { "type": ["string", "null"] },
            "failed_step": { "type": ["string", "null"] },
            "endpoint": { "type": ["string", "null"] },
        },
        "required": ["flow_code", "trigger_type", "error_code", "error_summary"],
    })
}

/// Normalizer that delegates the extraction to a generative model.
pub struct LlmNormalizer {
    llm: Arc<dyn LlmClient>,
}

impl LlmNormalizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Normalizer for LlmNormalizer {
    async fn normalize(&self, raw_log: &[LogRecord]) -> Result<NormalizedLog> {
        if raw_log.is_empty() {
            anyhow::bail!("Raw log is empty");
        }

        let user_prompt = format!(
            "Raw log records:\n{}",
            serde_json::to_string_pretty(raw_log)?
        );
        let response = self
            .llm
            .generate_json(SYSTEM_PROMPT, &user_prompt, &normalized_log_schema())
            .await
            .context("Normalization call failed")?;

        parse_normalized_log(&response)
    }
}

fn parse_normalized_log(content: &str) -> Result<NormalizedLog> {
    let mut log: NormalizedLog = serde_json::from_str(extract_json_object(content))
        .with_context(|| format!("Normalizer returned malformed JSON: {content}"))?;

    log.extra.retain(|_, v| !v.is_null());

    if log.embedding_text().is_empty() {
        anyhow::bail!("Normalizer returned no usable fields");
    }
    Ok(log)
}
