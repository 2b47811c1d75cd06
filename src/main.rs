use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mandi_predictor::{
    api,
    config::AppConfig,
    features::SystemClock,
    model::FileArtifactLoader,
    reference::ReferenceStore,
    registry::CommodityRegistry,
    PredictionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mandi_predictor=info,tower_http=info".into()),
        )
        .init();

    let cfg = AppConfig::from_env();
    tracing::info!("📁 Models directory: {}", cfg.models_dir.display());

    let reference = ReferenceStore::from_doc(cfg.reference_doc()?)
        .context("invalid reference data")?;
    let registry = CommodityRegistry::load(
        reference.commodities(),
        &cfg.models_dir,
        &FileArtifactLoader,
    );
    if registry.is_empty() {
        tracing::warn!("no commodity models loaded; every prediction will be rejected");
    }
    tracing::info!(
        "📍 Total districts in database: {} ({:?})",
        reference.districts().len(),
        reference.district_keys()
    );

    let service = Arc::new(PredictionService::new(
        reference,
        registry,
        Box::new(SystemClock),
    ));
    let app = api::app(service, &cfg.cors_origin).context("invalid CORS_ORIGIN")?;

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!("🚀 Backend listening on http://{}", cfg.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("🛑 Shutting down"),
        Err(e) => {
            tracing::error!("failed to install ctrl-c handler: {}", e);
            // keep serving; only an external kill stops the process now
            std::future::pending::<()>().await
        }
    }
}
