//! Turns raw vector hits into the candidates callers see.

use crate::models::Candidate;
use crate::search::vector::VectorHit;

/// Display length of `error_summary` before the ellipsis is appended.
pub const SUMMARY_MAX_CHARS: usize = 150;

const ELLIPSIS: &str = "...";

/// `(1 - distance) * 100`, rounded to two decimals and kept within [0, 100].
///
/// Rounds the exact stored value: 99.98499... becomes 99.98, where scaling by
/// 100 first would land on 9998.5 and round up.
pub fn similarity_from_distance(distance: f64) -> f64 {
    let pct = ((1.0 - distance) * 100.0).clamp(0.0, 100.0);
    format!("{pct:.2}").parse().unwrap_or(pct)
}

/// Cut `summary` to `SUMMARY_MAX_CHARS` characters, appending "..." when cut.
pub fn truncate_summary(summary: &str) -> String {
    match summary.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &summary[..byte_idx]),
        None => summary.to_string(),
    }
}

pub fn format_candidate(hit: VectorHit) -> Candidate {
    // A hit without a distance is treated as unrelated
    let distance = hit.similarity_score.unwrap_or(1.0);
    Candidate {
        jira_id: hit.jira_id,
        similarity_score: similarity_from_distance(distance),
        flow_code: hit.flow_code,
        trigger_type: hit.trigger_type,
        error_code: hit.error_code,
        error_summary: truncate_summary(hit.error_summary.as_deref().unwrap_or_default()),
        normalized_json: hit.normalized_json,
        rank: None,
        classification: None,
        confidence: None,
        reasoning: None,
    }
}
