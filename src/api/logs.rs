use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{IngestRequest, IngestResponse, StatsResponse};
use crate::state::AppState;

/// POST /api/logs - Add a raw log to the corpus under its ticket
pub async fn ingest_log(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, String)> {
    let jira_id = req.jira_id.trim().to_string();
    if jira_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "jira_id is required".to_string()));
    }
    if req.raw_log.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Raw log is required".to_string()));
    }

    let id = state
        .pipeline
        .ingest_log(&jira_id, &req.raw_log)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Ingest failed: {e:#}"),
            )
        })?;

    Ok((StatusCode::CREATED, Json(IngestResponse { id, jira_id })))
}

/// GET /api/stats - Corpus size
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        entries: state.pipeline.index().entry_count(),
    })
}
