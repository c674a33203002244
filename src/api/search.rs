use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::config::PipelineConfig;
use crate::models::{Candidate, LogRecord, SearchParams};
use crate::state::AppState;

/// POST /api/search?top_n=N - Duplicate detection for one raw log:
///   1. Normalize (LLM)
///   2. Embed
///   3. Vector similarity search, top N
///   4. Format (distance → similarity %, summary truncation)
///   5. LLM re-ranking with similarity-order fallback
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    Json(raw_log): Json<Vec<LogRecord>>,
) -> Result<Json<Vec<Candidate>>, (StatusCode, String)> {
    if raw_log.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Raw log is required".to_string()));
    }
    let top_n = resolve_top_n(params.top_n, &state.config.pipeline)?;

    state
        .pipeline
        .search_log(&raw_log, top_n)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Search failed: {e:#}"),
            )
        })
}

/// Missing means the configured default; anything above the cap is clamped.
fn resolve_top_n(
    requested: Option<usize>,
    config: &PipelineConfig,
) -> Result<usize, (StatusCode, String)> {
    match requested {
        None => Ok(config.default_top_n.min(config.max_top_n)),
        Some(0) => Err((
            StatusCode::BAD_REQUEST,
            "top_n must be at least 1".to_string(),
        )),
        Some(n) => Ok(n.min(config.max_top_n)),
    }
}
