use anyhow::{Context, Result};
use carbon_api::{build_app, ApiConfig};
use carbon_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("carbon_api");

    let config = ApiConfig::from_env();
    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        estimator_key_present = config.gemini.is_some(),
        estimator_concurrency = config.estimator_concurrency,
        "carboncart api started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
