//! Hackathon Radar - aggregates tech-event listings into one cached feed.
//!
//! Every refresh fans out to all registered sources, merges their events,
//! drops cross-source duplicates, sorts by start date and stores the result
//! envelope in the cache. Reads only ever return what the last refresh stored.

pub mod aggregate;
pub mod cache;
pub mod config;
mod error;
pub mod models;
mod routes;
pub mod scraping;
mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::http::Request;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub use self::cache::{CacheError, CacheStore, MemoryStore, RedisStore};
pub use self::config::AppConfig;
pub use self::error::ApiError;
pub use self::models::{Event, ResultEnvelope};
pub use self::routes::router;
pub use self::utils::config_path;

use scraping::SharedSource;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sources: Arc<Vec<SharedSource>>,
    pub cache: Arc<dyn CacheStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let sources = scraping::active_sources(&config)?;
        let cache = cache::store_from_config(&config)?;
        Ok(Self::with_parts(config, sources, cache))
    }

    pub fn with_parts(
        config: AppConfig,
        sources: Vec<SharedSource>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sources: Arc::new(sources),
            cache,
        }
    }
}

/// Runs the full pipeline and replaces the cached envelope. The cache
/// connection is opened first and closed on every path.
pub async fn refresh_and_store(state: &AppState) -> Result<ResultEnvelope, CacheError> {
    let mut conn = state.cache.connect().await?;

    let outcome: Result<ResultEnvelope, CacheError> = async {
        let envelope = aggregate::refresh(&state.sources).await;
        cache::put_envelope(
            conn.as_mut(),
            &state.config.cache_key,
            &envelope,
            state.config.cache_ttl(),
        )
        .await?;
        Ok(envelope)
    }
    .await;

    cache::release(conn).await;
    outcome
}

/// `Ok(None)` means nothing has been stored yet, or the entry expired.
pub async fn read_cached(state: &AppState) -> Result<Option<ResultEnvelope>, CacheError> {
    let mut conn = state.cache.connect().await?;
    let outcome = cache::get_envelope(conn.as_mut(), &state.config.cache_key).await;
    cache::release(conn).await;
    outcome
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;

    let app = router(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "starting server");

    axum::serve(listener, app).await?;
    Ok(())
}
