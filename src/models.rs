use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String, // "<source>-<external id>", unique per source before dedup
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub location: String,
    pub url: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Event {
    pub fn dedup_key(&self) -> (&str, &str) {
        (self.name.as_str(), self.start_date.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResultEnvelope {
    pub timestamp: String,
    pub total: usize,
    pub events: Vec<Event>,
}

impl ResultEnvelope {
    pub fn new(timestamp: String, events: Vec<Event>) -> Self {
        Self {
            timestamp,
            total: events.len(),
            events,
        }
    }
}
