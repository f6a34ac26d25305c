use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cadence::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, CachedFeatureStore},
    services::{
        providers::{
            AudioFeatureStore, CandidateTrackStore, InMemoryCatalog, ListeningHistoryProvider,
            PostgresCatalog,
        },
        RecommendationEngine,
    },
};

const MAX_DB_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cadence=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let (history, features, candidates) = open_catalog(&config).await?;

    let (features, cache_writer) = match &config.redis_url {
        Some(redis_url) => {
            let client = create_redis_client(redis_url)?;
            let (cache, writer) = Cache::new(client);
            tracing::info!(ttl_secs = config.feature_cache_ttl_secs, "Audio feature cache enabled");
            let cached: Arc<dyn AudioFeatureStore> = Arc::new(CachedFeatureStore::new(
                features,
                cache,
                config.feature_cache_ttl_secs,
            ));
            (cached, Some(writer))
        }
        None => (features, None),
    };

    let engine = RecommendationEngine::new(history, features, candidates, config.engine_settings());
    let state = AppState::new(Arc::new(engine), config.request_timeout());
    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(%address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

type Catalog = (
    Arc<dyn ListeningHistoryProvider>,
    Arc<dyn AudioFeatureStore>,
    Arc<dyn CandidateTrackStore>,
);

/// JSON catalog when CATALOG_PATH is set, PostgreSQL otherwise
async fn open_catalog(config: &Config) -> anyhow::Result<Catalog> {
    if let Some(path) = &config.catalog_path {
        let catalog = InMemoryCatalog::from_json_file(path).await?;
        return Ok(share(catalog));
    }

    let pool = create_pool(&config.database_url, MAX_DB_CONNECTIONS).await?;
    run_migrations(&pool).await?;
    tracing::info!("Connected to PostgreSQL catalog");

    Ok(share(PostgresCatalog::new(pool)))
}

fn share<C>(catalog: C) -> Catalog
where
    C: ListeningHistoryProvider + AudioFeatureStore + CandidateTrackStore + 'static,
{
    let catalog = Arc::new(catalog);
    (catalog.clone(), catalog.clone(), catalog)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
