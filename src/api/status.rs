use axum::extract::State;
use axum::Json;

use crate::config::Config;
use crate::state::AppState;

/// GET /api/health
pub async fn health() -> &'static str {
    "ok"
}

/// GET /api/config - Effective configuration (the API key is never serialized)
pub async fn get_config(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.clone())
}
