use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use marketplace::config::AppConfig;
use marketplace::db;
use marketplace::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is the default value, set it before exposing the server");
    }
    tracing::info!(
        database = %config.database_url,
        conflict_mode = config.conflict_mode.as_str(),
        "loaded configuration"
    );

    let conn = db::connect(&config).await?;
    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(conn, config));

    let app = marketplace::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
