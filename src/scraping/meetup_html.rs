use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use super::base;
use super::filter::EventFilter;
use super::EventSource;
use crate::config::AppConfig;
use crate::models::Event;
use crate::utils;

const BASE_URL: &str = "https://www.meetup.com";
const SOURCE_ID: &str = "meetup";
const SOURCE_NAME: &str = "Meetup";
const DEFAULT_TAG: &str = "tech";

static CARD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-element-name="event-card"]"#).expect("meetup card selector")
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3").expect("meetup title selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/events/"]"#).expect("meetup link selector"));
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time").expect("meetup time selector"));
static EVENT_TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-element-name="event-time"]"#).expect("meetup event time selector")
});
static LOCATION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-element-name="event-location"]"#).expect("meetup location selector")
});
static GROUP_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-element-name="group-name"]"#).expect("meetup group selector")
});
static ARTICLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"article, [role="article"]"#).expect("meetup article selector")
});
static ARTICLE_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"h3.ds2-m18, h3[class*="line-clamp"]"#)
        .expect("meetup article title selector")
});
static ARTICLE_LOCATION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-testid*="location"]"#).expect("meetup article location selector")
});
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("meetup paragraph selector"));

pub struct Meetup {
    client: Client,
    search_urls: Vec<String>,
    page_delay: Duration,
    city: String,
    tz: Tz,
    filter: EventFilter,
}

impl Meetup {
    pub fn new(client: Client, config: &AppConfig, filter: EventFilter, tz: Tz) -> Self {
        Self {
            client,
            search_urls: config.meetup_search_urls.clone(),
            page_delay: config.page_delay(),
            city: config.city.clone(),
            tz,
            filter,
        }
    }

    /// Runs both extraction strategies over one search page. Cards are all
    /// kept; an article is skipped when the page already holds its name.
    pub(crate) fn parse_page(&self, html: &str, now: DateTime<Utc>) -> Vec<Event> {
        let document = Html::parse_document(html);
        let mut page: Vec<Event> = document
            .select(&CARD_SELECTOR)
            .filter_map(|card| self.extract_card(&card, now))
            .collect();

        for article in document.select(&ARTICLE_SELECTOR) {
            let Some(candidate) = self.extract_article(&article, now) else {
                continue;
            };
            if page.iter().any(|seen| seen.name == candidate.name) {
                continue;
            }
            page.push(candidate);
        }

        page
    }

    fn extract_card(&self, card: &ElementRef<'_>, now: DateTime<Utc>) -> Option<Event> {
        let name = base::first_text(card, &TITLE_SELECTOR)?;
        let link = base::first_attr(card, &LINK_SELECTOR, "href");
        let Some(url) = base::absolute_url(BASE_URL, link) else {
            tracing::debug!(source = SOURCE_ID, name = %name, "skipping card without event link");
            return None;
        };

        let date_text = base::first_attr(card, &TIME_SELECTOR, "datetime")
            .or_else(|| base::first_text(card, &EVENT_TIME_SELECTOR));
        let location =
            base::first_text(card, &LOCATION_SELECTOR).unwrap_or_else(|| self.city.clone());
        let group = base::first_text(card, &GROUP_SELECTOR);

        Some(self.build_event(name, url, date_text, location, group, now))
    }

    fn extract_article(&self, article: &ElementRef<'_>, now: DateTime<Utc>) -> Option<Event> {
        let name = base::first_text(article, &ARTICLE_TITLE_SELECTOR)?;
        if name.chars().count() < 3 {
            return None;
        }
        let url = base::absolute_url(BASE_URL, base::first_attr(article, &LINK_SELECTOR, "href"))?;

        let date_text = article.select(&TIME_SELECTOR).next().and_then(|time| {
            time.value()
                .attr("datetime")
                .map(str::to_string)
                .or_else(|| Some(base::inner_text(time)))
                .filter(|text| !text.trim().is_empty())
        });
        let location = base::first_text(article, &ARTICLE_LOCATION_SELECTOR)
            .or_else(|| {
                article
                    .select(&PARAGRAPH_SELECTOR)
                    .map(base::inner_text)
                    .find(|text| text.contains('•'))
            })
            .unwrap_or_else(|| self.city.clone());

        Some(self.build_event(name, url, date_text, location, None, now))
    }

    fn build_event(
        &self,
        name: String,
        url: String,
        date_text: Option<String>,
        location: String,
        group: Option<String>,
        now: DateTime<Utc>,
    ) -> Event {
        let today = now.with_timezone(&self.tz).date_naive();
        let start_date = match date_text {
            Some(text) => base::normalize_start(&text, self.tz, today),
            None => base::format_utc(now),
        };
        let external_id = base::last_path_segment(&url).unwrap_or_else(|| utils::slugify(&name));

        Event {
            id: base::event_id(SOURCE_ID, Some(&external_id)),
            name,
            description: group.map(|g| utils::truncate_chars(&g, base::DESCRIPTION_LIMIT)),
            start_date,
            end_date: None,
            location,
            url,
            source: SOURCE_NAME.to_string(),
            tags: Some(vec![DEFAULT_TAG.to_string()]),
        }
    }

    /// Filters candidates from every page, then keeps the first event per name.
    pub(crate) fn finalize(&self, candidates: Vec<Event>) -> Vec<Event> {
        let mut unique: Vec<Event> = Vec::new();
        for event in candidates.into_iter().filter(|e| self.filter.accepts(e)) {
            if unique.iter().any(|seen| seen.name == event.name) {
                continue;
            }
            unique.push(event);
        }
        unique
    }
}

#[async_trait]
impl EventSource for Meetup {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn source_url(&self) -> String {
        format!("{BASE_URL}/find/")
    }

    async fn fetch(&self) -> Result<Vec<Event>> {
        let mut candidates = Vec::new();

        for (index, url) in self.search_urls.iter().enumerate() {
            if index > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            match base::fetch_html(&self.client, url).await {
                Ok(html) => {
                    let page = self.parse_page(&html, Utc::now());
                    tracing::debug!(source = SOURCE_ID, url = %url, count = page.len(), "parsed search page");
                    candidates.extend(page);
                }
                Err(err) => {
                    tracing::warn!(source = SOURCE_ID, url = %url, error = %format!("{err:#}"), "search page failed");
                }
            }
        }

        let events = self.finalize(candidates);
        tracing::info!(source = SOURCE_ID, count = events.len(), "relevant meetup events");
        Ok(events)
    }
}
