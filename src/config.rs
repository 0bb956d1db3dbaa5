use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const DEFAULT_KEYWORDS: [&str; 11] = [
    "hackathon",
    "hack ",
    "tech",
    "developer",
    "coding",
    "code",
    "learn",
    "development",
    "n8n",
    "lovable",
    "claude",
];

const DEFAULT_MEETUP_URLS: [&str; 3] = [
    "https://www.meetup.com/find/?keywords=Tech&source=EVENTS",
    "https://www.meetup.com/find/?keywords=tech&location=nl--Amsterdam",
    "https://www.meetup.com/find/?keywords=developer&location=nl--Amsterdam",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub city: String,
    pub timezone: String,
    pub target_month: u32,
    pub keywords: Vec<String>,
    /// `redis://` url of a shared cache. Unset keeps entries in-process.
    pub cache_url: Option<String>,
    pub cache_key: String,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub page_delay_ms: u64,
    pub luma_endpoint: String,
    pub luma_place_id: String,
    pub luma_page_limit: u32,
    pub meetup_search_urls: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            city: "Amsterdam".to_string(),
            timezone: "Europe/Amsterdam".to_string(),
            target_month: 12,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            cache_url: None,
            cache_key: "hackathons:amsterdam".to_string(),
            cache_ttl_secs: 1800,
            request_timeout_secs: 20,
            page_delay_ms: 1000,
            luma_endpoint: "https://api2.luma.com/discover/get-paginated-events".to_string(),
            luma_place_id: "discplace-FC4SDMUVXiFtMOr".to_string(),
            luma_page_limit: 500,
            meetup_search_urls: DEFAULT_MEETUP_URLS.iter().map(|u| u.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Reads the JSON file at `path` when it exists, then applies `RADAR_*`
    /// environment overrides and validates the result.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = read_config(path)?;
        config.apply_env()?;
        config.validate()?;

        let backend = if config.cache_url.is_some() { "redis" } else { "memory" };
        tracing::info!(
            bind_addr = %config.bind_addr,
            city = %config.city,
            target_month = config.target_month,
            cache_key = %config.cache_key,
            cache_backend = %backend,
            "configuration loaded"
        );
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("RADAR_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(city) = std::env::var("RADAR_CITY") {
            self.city = city;
        }
        if let Ok(tz) = std::env::var("RADAR_TIMEZONE") {
            self.timezone = tz;
        }
        if let Ok(url) = std::env::var("RADAR_CACHE_URL") {
            self.cache_url = Some(url.trim().to_string()).filter(|url| !url.is_empty());
        }
        if let Ok(month) = std::env::var("RADAR_TARGET_MONTH") {
            self.target_month = month
                .trim()
                .parse()
                .with_context(|| format!("RADAR_TARGET_MONTH is not a number: {month}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.target_month) {
            bail!("target_month must be between 1 and 12, got {}", self.target_month);
        }
        self.tz()?;
        if self.cache_ttl_secs == 0 {
            bail!("cache_ttl_secs must be positive");
        }
        if self.keywords.iter().all(|k| k.is_empty()) {
            bail!("at least one relevance keyword is required");
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow::anyhow!("invalid timezone {}: {err}", self.timezone))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("unable to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("unable to parse config {}", path.display()))
}
