use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::base;
use super::filter::EventFilter;
use super::EventSource;
use crate::config::AppConfig;
use crate::models::Event;
use crate::utils;

const PERMALINK_BASE: &str = "https://lu.ma/";
const SOURCE_ID: &str = "luma";
const SOURCE_NAME: &str = "Luma";

#[derive(Debug, Deserialize)]
struct LumaEntry {
    event: Option<LumaEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LumaEvent {
    api_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    start_at: Option<String>,
    end_at: Option<String>,
    url: Option<String>,
    geo_address_json: Option<GeoAddress>,
    tags: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeoAddress {
    city: Option<String>,
}

pub struct Luma {
    client: Client,
    endpoint: String,
    place_id: String,
    page_limit: u32,
    city: String,
    tz: Tz,
    filter: EventFilter,
}

impl Luma {
    pub fn new(client: Client, config: &AppConfig, filter: EventFilter, tz: Tz) -> Self {
        Self {
            client,
            endpoint: config.luma_endpoint.clone(),
            place_id: config.luma_place_id.clone(),
            page_limit: config.luma_page_limit,
            city: config.city.clone(),
            tz,
            filter,
        }
    }

    fn endpoint(&self) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(
            &self.endpoint,
            [
                ("discover_place_api_id", self.place_id.as_str()),
                ("pagination_limit", self.page_limit.to_string().as_str()),
            ],
        )
        .context("invalid luma endpoint")
    }

    pub(crate) fn parse_payload(&self, body: &str) -> Result<Vec<Event>> {
        let payload: Value = serde_json::from_str(body).context("luma payload is not json")?;
        let entries = match payload.get("entries").and_then(Value::as_array) {
            Some(entries) => entries,
            None => {
                tracing::warn!(source = SOURCE_ID, "luma payload has no entries list");
                return Ok(Vec::new());
            }
        };

        let today = Utc::now().with_timezone(&self.tz).date_naive();
        let mut events = Vec::new();
        for (index, raw) in entries.iter().enumerate() {
            let entry: LumaEntry = match serde_json::from_value(raw.clone()) {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(source = SOURCE_ID, index, error = %err, "skipping malformed entry");
                    continue;
                }
            };
            let Some(event) = entry.event else {
                continue;
            };
            if let Some(mapped) = self.map_event(event, today) {
                events.push(mapped);
            }
        }

        Ok(events)
    }

    fn map_event(&self, event: LumaEvent, today: chrono::NaiveDate) -> Option<Event> {
        let start_raw = event.start_at.as_deref()?;
        let start_date = base::normalize_start(start_raw, self.tz, today);
        let name = event
            .name
            .map(|n| base::clean_text(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled Event".to_string());

        if !self.filter.is_relevant(&name, event.description.as_deref())
            || !self.filter.in_target_month(&start_date)
        {
            return None;
        }

        let api_id = event.api_id.filter(|id| !id.trim().is_empty());
        let url = match (event.url, api_id.as_deref()) {
            (Some(url), _) if !url.trim().is_empty() => {
                base::absolute_url(PERMALINK_BASE, Some(url.trim().to_string()))?
            }
            (_, Some(id)) => format!("{PERMALINK_BASE}{id}"),
            _ => {
                tracing::debug!(source = SOURCE_ID, name = %name, "skipping entry without link");
                return None;
            }
        };

        Some(Event {
            id: base::event_id(SOURCE_ID, api_id.as_deref()),
            name,
            description: event
                .description
                .map(|d| utils::truncate_chars(&d, base::DESCRIPTION_LIMIT)),
            start_date,
            end_date: event
                .end_at
                .map(|end| base::normalize_start(&end, self.tz, today)),
            location: event
                .geo_address_json
                .and_then(|geo| geo.city)
                .filter(|city| !city.trim().is_empty())
                .unwrap_or_else(|| self.city.clone()),
            url,
            source: SOURCE_NAME.to_string(),
            tags: Some(
                event
                    .tags
                    .unwrap_or_default()
                    .iter()
                    .filter_map(tag_label)
                    .collect(),
            ),
        })
    }
}

fn tag_label(tag: &Value) -> Option<String> {
    match tag {
        Value::String(label) => Some(label.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl EventSource for Luma {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn source_url(&self) -> String {
        self.endpoint()
            .map(|url| url.to_string())
            .unwrap_or_else(|_| self.endpoint.clone())
    }

    async fn fetch(&self) -> Result<Vec<Event>> {
        let url = self.endpoint()?;
        let body = base::fetch_json(&self.client, url.as_str()).await?;
        self.parse_payload(&body)
    }
}
