use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flashsale_core::cache::{Cache, MemoryCache, RedisCache};
use flashsale_core::config::{CacheBackend, Config};
use flashsale_core::metrics::Metrics;
use flashsale_core::services::sweeper;
use flashsale_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let cache: Arc<dyn Cache> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("REDIS_URL is required when CACHE_BACKEND=redis"))?;
            Arc::new(RedisCache::new(url)?)
        }
    };
    tracing::info!(backend = ?config.cache_backend, "Cache backend initialized");

    let state = AppState::new(pool, cache, Arc::new(Metrics::default()));

    sweeper::start(state.holds.clone());
    tracing::info!("Expired-holds sweeper scheduled");

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
