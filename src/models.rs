use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One key-value record of a raw log, in the order the caller sent it.
pub type LogRecord = Map<String, Value>;

/// Canonical structured form of a log, produced by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
    /// Anything else the normalizer extracted (endpoint, host, stage, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NormalizedLog {
    /// Text that gets embedded. Known fields come first in a fixed order so
    /// two normalizations of the same failure produce the same text.
    pub fn embedding_text(&self) -> String {
        let mut lines = Vec::new();
        let known = [
            ("flow_code", &self.flow_code),
            ("trigger_type", &self.trigger_type),
            ("error_code", &self.error_code),
            ("error_summary", &self.error_summary),
        ];
        for (key, value) in known {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                lines.push(format!("{key}: {v}"));
            }
        }
        for (key, value) in &self.extra {
            match value {
                Value::Null => {}
                Value::String(s) => lines.push(format!("{key}: {s}")),
                other => lines.push(format!("{key}: {other}")),
            }
        }
        lines.join("\n")
    }
}

/// How the re-ranker judged a candidate against the query log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Duplicate,
    Related,
    NotDuplicate,
    #[serde(other)]
    Unknown,
}

/// A likely-duplicate ticket. Re-rank fields stay `None` (and are omitted from
/// JSON) when re-ranking was skipped or fell back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub jira_id: String,
    pub similarity_score: f64,
    pub flow_code: Option<String>,
    pub trigger_type: Option<String>,
    pub error_code: Option<String>,
    pub error_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// One entry of the re-ranker's structured answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankEntry {
    pub jira_id: String,
    pub rank: Option<u32>,
    pub classification: Option<Classification>,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
}

impl RerankEntry {
    /// Read one entry leniently. Only `jira_id` is required; a field of the
    /// wrong shape is treated as absent instead of failing the whole answer.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let jira_id = match obj.get("jira_id")? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        Some(Self {
            jira_id,
            rank: obj.get("rank").and_then(rank_from_value),
            classification: obj
                .get("classification")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            confidence: obj.get("confidence").and_then(Value::as_f64),
            reasoning: obj
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Ranks start at 1. Integral floats (`1.0`) and numeric strings are accepted;
/// zero, negative or non-numeric ranks count as unranked.
fn rank_from_value(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() || n < 1.0 || n > u32::MAX as f64 {
        return None;
    }
    Some(n.round() as u32)
}

/// The re-ranker's answer. Entries stay raw so one odd entry cannot sink
/// the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct RerankResponse {
    pub results: Vec<Value>,
}

/// Query string of `POST /api/search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub top_n: Option<usize>,
}

/// Ingest request: a raw log and the ticket it was filed under
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub jira_id: String,
    pub raw_log: Vec<LogRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub id: Uuid,
    pub jira_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification_parses_screaming_case() {
        let c: Classification = serde_json::from_value(json!("NOT_DUPLICATE")).unwrap();
        assert_eq!(c, Classification::NotDuplicate);
    }

    #[test]
    fn test_classification_unknown_value_does_not_fail() {
        let c: Classification = serde_json::from_value(json!("POSSIBLY")).unwrap();
        assert_eq!(c, Classification::Unknown);
    }

    #[test]
    fn test_normalized_log_keeps_extra_fields() {
        let log: NormalizedLog = serde_json::from_value(json!({
            "flow_code": "INV_SYNC",
            "error_code": "ORA-00001",
            "endpoint": "/invoices",
        }))
        .unwrap();
        assert_eq!(log.flow_code.as_deref(), Some("INV_SYNC"));
        assert_eq!(log.extra["endpoint"], "/invoices");

        let back = serde_json::to_value(&log).unwrap();
        assert_eq!(back["endpoint"], "/invoices");
        assert!(back.get("trigger_type").is_none());
    }

    #[test]
    fn test_embedding_text_orders_known_fields_first() {
        let log: NormalizedLog = serde_json::from_value(json!({
            "stage": "invoke",
            "error_summary": "unique constraint violated",
            "flow_code": "INV_SYNC",
            "retries": 3,
            "host": null,
        }))
        .unwrap();
        assert_eq!(
            log.embedding_text(),
            "flow_code: INV_SYNC\nerror_summary: unique constraint violated\nstage: invoke\nretries: 3"
        );
    }

    #[test]
    fn test_rerank_entry_accepts_float_and_string_ranks() {
        let float = RerankEntry::from_value(&json!({"jira_id": "OLL-2", "rank": 1.0})).unwrap();
        assert_eq!(float.rank, Some(1));
        let text = RerankEntry::from_value(&json!({"jira_id": "OLL-2", "rank": "3"})).unwrap();
        assert_eq!(text.rank, Some(3));
    }

    #[test]
    fn test_rerank_entry_bad_rank_is_unranked() {
        for rank in [json!(-1), json!(0), json!("first"), json!(null), json!([1])] {
            let entry =
                RerankEntry::from_value(&json!({"jira_id": "OLL-2", "rank": rank})).unwrap();
            assert_eq!(entry.rank, None, "rank {rank}");
        }
    }

    #[test]
    fn test_rerank_entry_requires_jira_id() {
        assert!(RerankEntry::from_value(&json!({"rank": 2})).is_none());
        assert!(RerankEntry::from_value(&json!({"jira_id": "  ", "rank": 2})).is_none());
        assert!(RerankEntry::from_value(&json!("OLL-1")).is_none());
    }

    #[test]
    fn test_rerank_entry_ignores_mistyped_fields() {
        let entry = RerankEntry::from_value(&json!({
            "jira_id": "OLL-4",
            "rank": 2,
            "classification": 7,
            "confidence": "high",
            "reasoning": "same table",
        }))
        .unwrap();
        assert_eq!(entry.rank, Some(2));
        assert_eq!(entry.classification, None);
        assert_eq!(entry.confidence, None);
        assert_eq!(entry.reasoning.as_deref(), Some("same table"));
    }

    #[test]
    fn test_unannotated_candidate_omits_rerank_fields() {
        let candidate = Candidate {
            jira_id: "OLL-1".to_string(),
            similarity_score: 88.0,
            flow_code: None,
            trigger_type: None,
            error_code: None,
            error_summary: String::new(),
            normalized_json: None,
            rank: None,
            classification: None,
            confidence: None,
            reasoning: None,
        };
        let json = serde_json::to_value(&candidate).unwrap();
        assert!(json.get("rank").is_none());
        assert!(json.get("classification").is_none());
        assert!(json.get("normalized_json").is_none());
        assert_eq!(json["similarity_score"], 88.0);
    }
}
