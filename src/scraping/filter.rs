use anyhow::Result;
use chrono::Datelike;
use chrono_tz::Tz;

use super::base;
use crate::config::AppConfig;
use crate::models::Event;

/// Relevance (keyword) and temporal (month-of-year) filter shared by every source.
#[derive(Debug, Clone)]
pub struct EventFilter {
    keywords: Vec<String>,
    target_month: u32,
    tz: Tz,
}

impl EventFilter {
    pub fn new(keywords: &[String], target_month: u32, tz: Tz) -> Self {
        Self {
            // "hack " relies on its trailing space, so keywords are not trimmed
            keywords: keywords
                .iter()
                .filter(|k| !k.is_empty())
                .map(|k| k.to_lowercase())
                .collect(),
            target_month,
            tz,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(&config.keywords, config.target_month, config.tz()?))
    }

    pub fn is_relevant(&self, name: &str, description: Option<&str>) -> bool {
        let name = name.to_lowercase();
        let description = description.map(str::to_lowercase).unwrap_or_default();
        self.keywords
            .iter()
            .any(|keyword| name.contains(keyword.as_str()) || description.contains(keyword.as_str()))
    }

    /// Unparsable start dates never match.
    pub fn in_target_month(&self, start_date: &str) -> bool {
        base::parse_start(start_date)
            .map(|dt| dt.with_timezone(&self.tz).month() == self.target_month)
            .unwrap_or(false)
    }

    pub fn accepts(&self, event: &Event) -> bool {
        self.is_relevant(&event.name, event.description.as_deref())
            && self.in_target_month(&event.start_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn december() -> EventFilter {
        EventFilter::from_config(&AppConfig::default()).expect("default filter")
    }

    #[test]
    fn matches_keywords_case_insensitively() {
        let filter = december();
        assert!(filter.is_relevant("Amsterdam HACKATHON 2024", None));
        assert!(filter.is_relevant("Friday drinks", Some("Bring your Developer friends")));
        assert!(filter.is_relevant("Lovable build night", None));
        assert!(!filter.is_relevant("Pottery class", Some("Clay and glaze")));
    }

    #[test]
    fn hack_keyword_needs_a_trailing_space() {
        let filter = EventFilter::new(&["hack ".to_string()], 12, chrono_tz::UTC);
        assert!(filter.is_relevant("Hack Night", None));
        assert!(!filter.is_relevant("Hacker News meetup", None));
    }

    #[test]
    fn compares_month_in_configured_timezone() {
        let filter = december();
        assert!(filter.in_target_month("2024-12-05T10:00:00Z"));
        // 23:30 UTC on Nov 30 is already December 1st in Amsterdam
        assert!(filter.in_target_month("2024-11-30T23:30:00Z"));
        assert!(!filter.in_target_month("2024-11-05T10:00:00Z"));
        assert!(!filter.in_target_month("not a date"));
    }

    #[test]
    fn rejects_relevant_event_outside_target_month() {
        let filter = december();
        let event = Event {
            id: "meetup-1".to_string(),
            name: "Tech Developer Coding Hackathon".to_string(),
            description: Some("hackathon for developers".to_string()),
            start_date: "2025-01-10T09:00:00Z".to_string(),
            end_date: None,
            location: "Amsterdam".to_string(),
            url: "https://www.meetup.com/x/events/1/".to_string(),
            source: "Meetup".to_string(),
            tags: None,
        };
        assert!(!filter.accepts(&event));
    }
}
