use anyhow::Result;
use async_trait::async_trait;

use super::EventSource;
use crate::models::Event;

/// Placeholder until an Eventbrite API token is provisioned.
pub struct Eventbrite;

#[async_trait]
impl EventSource for Eventbrite {
    fn source_id(&self) -> &'static str {
        "eventbrite"
    }

    fn source_name(&self) -> &'static str {
        "Eventbrite"
    }

    fn source_url(&self) -> String {
        "https://www.eventbriteapi.com/v3/".to_string()
    }

    async fn fetch(&self) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }
}
