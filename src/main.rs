use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use loglens::api;
use loglens::config::Config;
use loglens::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    tracing::info!(
        "Re-ranking {}",
        if config.pipeline.rerank_enabled { "enabled" } else { "disabled" }
    );

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/search", post(api::search::search))
        .route("/api/logs", post(api::logs::ingest_log))
        .route("/api/stats", get(api::logs::stats))
        .route("/api/config", get(api::status::get_config))
        .route("/api/health", get(api::status::health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
