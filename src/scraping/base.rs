use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use scraper::{ElementRef, Selector};

pub const DESCRIPTION_LIMIT: usize = 200;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,2})(?::(\d{2}))?\s*(am|pm)").expect("valid time regex"));
static CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid clock regex"));
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?",
    )
    .expect("valid month-day regex")
});

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(|node| {
        let cleaned = inner_text(node);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    })
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn absolute_url(base: &str, href: Option<String>) -> Option<String> {
    let href = href?;
    if is_absolute_url(&href) {
        return Some(href);
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    base_url.join(&href).ok().map(|u| u.to_string())
}

pub fn is_absolute_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Last non-empty path segment of an absolute url, ignoring query and fragment.
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// `<prefix>-<external id>`, or a random suffix when the source has no stable id.
pub fn event_id(prefix: &str, external_id: Option<&str>) -> String {
    match external_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("{prefix}-{id}"),
        None => format!("{prefix}-{}", uuid::Uuid::new_v4()),
    }
}

pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("hackathon-radar/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("unable to build http client")
}

pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let request = client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .header(ACCEPT, HTML_ACCEPT)
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
    fetch_fresh(request, url).await
}

pub async fn fetch_json(client: &Client, url: &str) -> Result<String> {
    let request = client.get(url).header(ACCEPT, "application/json");
    fetch_fresh(request, url).await
}

async fn fetch_fresh(request: RequestBuilder, url: &str) -> Result<String> {
    let response = request
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .send()
        .await
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .await
        .with_context(|| format!("unable to read response body for {url}"))
}

pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_start(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Best-effort conversion of an upstream start value into an RFC 3339 UTC
/// timestamp. Values that cannot be interpreted are returned cleaned but
/// otherwise untouched.
pub fn normalize_start(raw: &str, tz: Tz, today: NaiveDate) -> String {
    let cleaned = clean_text(raw);
    // Meetup appends the zone name: 2024-12-05T18:00:00+01:00[Europe/Amsterdam]
    let candidate = match cleaned.find('[') {
        Some(idx) => cleaned[..idx].trim(),
        None => cleaned.as_str(),
    };

    if let Some(dt) = parse_start(candidate) {
        return format_utc(dt);
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, fmt) {
            if let Some(dt) = to_timezone_datetime(naive.date(), naive.time(), tz) {
                return format_utc(dt.with_timezone(&Utc));
            }
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(candidate, "%Y-%m-%d") {
        if let Some(dt) = to_timezone_datetime(date, NaiveTime::MIN, tz) {
            return format_utc(dt.with_timezone(&Utc));
        }
    }

    match parse_text_datetime(candidate, tz, today) {
        Some(dt) => format_utc(dt.with_timezone(&Utc)),
        None => cleaned,
    }
}

/// Parses listing text such as "Thu, Dec 5 · 6:00 PM CET". A missing year
/// resolves to the next occurrence on or after `today`.
pub fn parse_text_datetime(text: &str, tz: Tz, today: NaiveDate) -> Option<DateTime<Tz>> {
    let caps = MONTH_DAY_RE.captures(text)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let day = caps.get(2)?.as_str().parse::<u32>().ok()?;
    let date = match caps.get(3) {
        Some(year) => NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month, day)?,
        None => {
            let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if date < today {
                date.with_year(today.year() + 1)?
            } else {
                date
            }
        }
    };
    let time = parse_time(text).unwrap_or(NaiveTime::MIN);
    to_timezone_datetime(date, time, tz)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    if let Some(caps) = TIME_RE.captures(text) {
        let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let minute = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        let normalized = format!("{:02}:{:02} {}", hour, minute, caps.get(3)?.as_str());
        return NaiveTime::parse_from_str(&normalized, "%I:%M %p").ok();
    }
    let caps = CLOCK_RE.captures(text)?;
    NaiveTime::from_hms_opt(
        caps.get(1)?.as_str().parse().ok()?,
        caps.get(2)?.as_str().parse().ok()?,
        0,
    )
}

fn month_number(prefix: &str) -> Option<u32> {
    let month = match prefix.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn to_timezone_datetime(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Tz>> {
    let naive = NaiveDateTime::new(date, time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(dt, _) => Some(dt),
        LocalResult::None => None,
    }
}
