//! # Pipeline Gate Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use pipeline_gate::{
    classifier::build_classifier,
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    server::run_server,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;

    init_tracing(&config).context("Failed to initialize tracing")?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    run_migrations(&db).await?;

    let classifier =
        build_classifier(&config.classifier).context("Failed to build classification engine")?;
    tracing::info!(classifier = classifier.name(), "Classification engine ready");

    run_server(Arc::new(config), Arc::new(db), classifier).await
}
