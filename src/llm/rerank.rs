use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};

use crate::llm::generate::{extract_json_object, LlmClient};
use crate::models::{Candidate, NormalizedLog, RerankEntry, RerankResponse};

/// Rank given to merged entries the model left unranked; sorts them last.
pub const UNRANKED: u32 = 999;

const SYSTEM_PROMPT: &str = "You triage integration failures. You are given a new error log \
(already normalized) and a list of previously filed tickets whose logs were found by vector \
similarity. For each ticket decide whether the new log is the same underlying failure.\n\
Classify each ticket as DUPLICATE (same root cause, same flow), RELATED (same flow or same \
error family but a different root cause) or NOT_DUPLICATE. Give a confidence between 0 and 1 \
and one sentence of reasoning. Rank the tickets from most to least likely duplicate, starting \
at 1. Use the jira_id exactly as given. Respond with ONLY the JSON object.";

/// Re-rank vector-search candidates with a generative model.
///
/// Never fails: if the call errors or the answer cannot be parsed, the
/// candidates come back unchanged, in similarity order. Entries the model
/// returns for unknown tickets are dropped, so the result may be shorter
/// than the input.
pub async fn rerank(
    llm: &dyn LlmClient,
    normalized: &NormalizedLog,
    candidates: Vec<Candidate>,
) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    match try_rerank(llm, normalized, &candidates).await {
        Ok(ranked) => {
            tracing::info!(
                "Re-ranking applied: {} of {} candidates kept",
                ranked.len(),
                candidates.len()
            );
            ranked
        }
        Err(e) => {
            tracing::warn!("Re-ranking failed, keeping similarity order: {e:#}");
            candidates
        }
    }
}

async fn try_rerank(
    llm: &dyn LlmClient,
    normalized: &NormalizedLog,
    candidates: &[Candidate],
) -> Result<Vec<Candidate>> {
    let user_prompt = build_user_prompt(normalized, candidates)?;
    let response = llm
        .generate_json(SYSTEM_PROMPT, &user_prompt, &rerank_schema())
        .await
        .context("Re-rank call failed")?;

    let parsed: RerankResponse = serde_json::from_str(extract_json_object(&response))
        .with_context(|| format!("Re-rank response is not valid JSON: {response}"))?;

    Ok(merge_rankings(candidates, parse_entries(&parsed.results)))
}

/// Keep every entry that names a ticket; skip the rest with a warning.
pub fn parse_entries(raw: &[Value]) -> Vec<RerankEntry> {
    raw.iter()
        .filter_map(|value| {
            let entry = RerankEntry::from_value(value);
            if entry.is_none() {
                tracing::warn!("Re-ranker returned an entry without a ticket id; skipping {value}");
            }
            entry
        })
        .collect()
}

/// Last path segment of a ticket identifier: `https://x/browse/OLL-1234`
/// becomes `OLL-1234`. Trailing slashes are ignored.
pub fn short_id(jira_id: &str) -> &str {
    let trimmed = jira_id.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Merge the model's rankings into copies of the matching candidates and
/// order them by rank. Candidates are found by full identifier or short id.
pub fn merge_rankings(candidates: &[Candidate], entries: Vec<RerankEntry>) -> Vec<Candidate> {
    let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(candidates.len() * 2);
    for (i, c) in candidates.iter().enumerate() {
        lookup.entry(c.jira_id.as_str()).or_insert(i);
    }
    // Full identifiers win over a colliding short id
    for (i, c) in candidates.iter().enumerate() {
        let short = short_id(&c.jira_id);
        if !short.is_empty() {
            lookup.entry(short).or_insert(i);
        }
    }

    let mut merged = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    for entry in entries {
        let found = lookup
            .get(entry.jira_id.as_str())
            .or_else(|| lookup.get(short_id(&entry.jira_id)))
            .copied();

        let Some(idx) = found else {
            tracing::warn!(
                "Re-ranker returned unknown ticket {}; dropping it",
                entry.jira_id
            );
            continue;
        };
        if !seen.insert(idx) {
            tracing::warn!(
                "Re-ranker returned ticket {} more than once; keeping the first",
                entry.jira_id
            );
            continue;
        }

        let mut candidate = candidates[idx].clone();
        candidate.rank = entry.rank;
        candidate.classification = entry.classification;
        candidate.confidence = entry.confidence;
        candidate.reasoning = entry.reasoning;
        merged.push(candidate);
    }

    // Stable: unranked entries keep the order the model listed them in
    merged.sort_by_key(|c| c.rank.unwrap_or(UNRANKED));
    merged
}

/// What the model sees of each candidate.
#[derive(Serialize)]
struct CandidateView<'a> {
    jira_id: &'a str,
    similarity_score: f64,
    flow_code: Option<&'a str>,
    trigger_type: Option<&'a str>,
    error_code: Option<&'a str>,
    error_summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    normalized_json: Option<&'a Value>,
}

fn build_user_prompt(normalized: &NormalizedLog, candidates: &[Candidate]) -> Result<String> {
    let views: Vec<CandidateView<'_>> = candidates
        .iter()
        .map(|c| CandidateView {
            jira_id: &c.jira_id,
            similarity_score: c.similarity_score,
            flow_code: c.flow_code.as_deref(),
            trigger_type: c.trigger_type.as_deref(),
            error_code: c.error_code.as_deref(),
            error_summary: &c.error_summary,
            normalized_json: c.normalized_json.as_ref(),
        })
        .collect();

    Ok(format!(
        "New log:\n{}\n\nCandidate tickets (most similar first):\n{}",
        serde_json::to_string_pretty(normalized)?,
        serde_json::to_string_pretty(&views)?
    ))
}

fn rerank_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "jira_id": { "type": "string" },
                        "rank": { "type": "integer" },
                        "classification": {
                            "type": "string",
                            "enum": ["DUPLICATE", "RELATED", "NOT_DUPLICATE"]
                        },
                        "confidence": { "type": "number" },
                        "reasoning": { "type": "string" }
                    },
                    "required": ["jira_id", "rank", "classification", "confidence", "reasoning"]
                }
            }
        },
        "required": ["results"]
    })
}
