use anyhow::Context;
use nutrient_predictor::{router, AppConfig, AppState, ModelManager, Store};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = AppConfig::from_env()?;

    // Refuse to start without every artifact.
    let models = ModelManager::load(&cfg.models_dir)
        .with_context(|| format!("failed to load models from {}", cfg.models_dir.display()))?;
    tracing::info!(n_features = models.n_features(), "all models loaded");

    let store = Store::connect(&cfg.database_url, cfg.db_max_connections)
        .await
        .with_context(|| format!("failed to open database {}", cfg.database_url))?;
    tracing::info!(url = %cfg.database_url, "database ready");

    tracing::info!(origins = ?cfg.cors_origins, "CORS enabled");
    let app = router(AppState::new(models, store), &cfg.cors_origins);

    let addr = cfg.socket_addr()?;
    tracing::info!("listening on http://{}/api", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
    }
}
