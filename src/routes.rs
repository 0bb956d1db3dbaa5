//! HTTP routes.
//!
//! - `POST /api/scrape` - run every source and replace the cached envelope
//! - `GET /api/scrape` - return the cached envelope, 404 when nothing is cached
//! - `GET /api/sources` - registered sources
//! - `GET /api/sources/{id}/preview` - run one source without touching the cache
//! - `GET /health`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{Event, ResultEnvelope};
use crate::scraping::{self, ScraperInfo};
use crate::{read_cached, refresh_and_store, AppState};

const MISS_MESSAGE: &str = "No cached data found. Trigger POST /api/scrape to fetch events.";

#[derive(Debug, Serialize)]
struct RefreshResponse {
    success: bool,
    message: String,
    data: ResultEnvelope,
}

#[derive(Debug, Serialize)]
struct CachedResponse {
    success: bool,
    cached: bool,
    data: ResultEnvelope,
}

#[derive(Debug, Serialize)]
struct MissResponse {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct PreviewResponse {
    success: bool,
    source: String,
    total: usize,
    events: Vec<Event>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/scrape", get(read_events).post(refresh_events))
        .route("/sources", get(list_sources))
        .route("/sources/{id}/preview", get(preview_source));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
}

async fn refresh_events(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    tracing::info!("refreshing hackathon events");
    let envelope = refresh_and_store(&state).await?;

    Ok(Json(RefreshResponse {
        success: true,
        message: format!("Fetched and stored {} hackathon events", envelope.total),
        data: envelope,
    }))
}

async fn read_events(State(state): State<AppState>) -> Result<Response, ApiError> {
    match read_cached(&state).await? {
        Some(envelope) => Ok(Json(CachedResponse {
            success: true,
            cached: true,
            data: envelope,
        })
        .into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(MissResponse {
                success: false,
                message: MISS_MESSAGE,
            }),
        )
            .into_response()),
    }
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<ScraperInfo>> {
    Json(scraping::list_sources(&state.sources))
}

async fn preview_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let source = scraping::find_source(&state.sources, &id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown source id: {id}")))?;
    let events = scraping::collect(source.as_ref()).await;

    Ok(Json(PreviewResponse {
        success: true,
        source: id,
        total: events.len(),
        events,
    }))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
