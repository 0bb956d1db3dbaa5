pub mod base;
pub mod eventbrite_api;
pub mod filter;
pub mod luma_api;
pub mod meetup_html;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;

use crate::config::AppConfig;
use crate::models::Event;

pub use filter::EventFilter;

#[async_trait]
pub trait EventSource: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn source_name(&self) -> &'static str;
    fn source_url(&self) -> String;
    async fn fetch(&self) -> anyhow::Result<Vec<Event>>;
}

pub type SharedSource = Arc<dyn EventSource>;

#[derive(Clone, Debug, serde::Serialize)]
pub struct ScraperInfo {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Registered sources in invocation order. Earlier sources win dedup ties.
pub fn active_sources(config: &AppConfig) -> anyhow::Result<Vec<SharedSource>> {
    let client = base::http_client(config.request_timeout())?;
    let filter = EventFilter::from_config(config)?;
    let tz = config.tz()?;

    let sources: Vec<SharedSource> = vec![
        Arc::new(luma_api::Luma::new(client.clone(), config, filter.clone(), tz)),
        Arc::new(eventbrite_api::Eventbrite),
        Arc::new(meetup_html::Meetup::new(client, config, filter, tz)),
    ];
    Ok(sources)
}

pub fn list_sources(sources: &[SharedSource]) -> Vec<ScraperInfo> {
    sources
        .iter()
        .map(|source| ScraperInfo {
            id: source.source_id().to_string(),
            name: source.source_name().to_string(),
            url: source.source_url(),
        })
        .collect()
}

pub fn find_source<'a>(sources: &'a [SharedSource], id: &str) -> Option<&'a SharedSource> {
    sources.iter().find(|source| source.source_id() == id)
}

/// Runs one source and never fails: errors and panics are logged and the
/// source contributes nothing. Events without an id or an absolute url are
/// dropped.
pub async fn collect(source: &dyn EventSource) -> Vec<Event> {
    let source_id = source.source_id();
    let mut events = match AssertUnwindSafe(source.fetch()).catch_unwind().await {
        Ok(Ok(events)) => events,
        Ok(Err(err)) => {
            tracing::warn!(source = source_id, error = %format!("{err:#}"), "source fetch failed");
            return Vec::new();
        }
        Err(_) => {
            tracing::warn!(source = source_id, "source fetch panicked");
            return Vec::new();
        }
    };

    let before = events.len();
    events.retain(|event| !event.id.is_empty() && base::is_absolute_url(&event.url));
    if events.len() < before {
        tracing::debug!(
            source = source_id,
            dropped = before - events.len(),
            "dropped events without id or absolute url"
        );
    }

    tracing::info!(source = source_id, count = events.len(), "source fetched");
    events
}
