use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::join_all;

use crate::models::{Event, ResultEnvelope};
use crate::scraping::{self, base, SharedSource};

/// Runs every source at once and waits for all of them. The result keeps
/// source order.
pub async fn fan_out(sources: &[SharedSource]) -> Vec<Vec<Event>> {
    join_all(
        sources
            .iter()
            .map(|source| scraping::collect(source.as_ref())),
    )
    .await
}

/// Keeps the first event for each `(name, startDate)` pair.
pub fn dedupe(events: Vec<Event>) -> Vec<Event> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|event| seen.insert((event.name.clone(), event.start_date.clone())))
        .collect()
}

/// Stable ascending sort by start time; unparsable dates go last.
pub fn sort_by_start(events: &mut [Event]) {
    events.sort_by_cached_key(|event| {
        let parsed = base::parse_start(&event.start_date);
        (parsed.is_none(), parsed)
    });
}

pub fn assemble(source_lists: Vec<Vec<Event>>, generated_at: DateTime<Utc>) -> ResultEnvelope {
    let flattened: Vec<Event> = source_lists.into_iter().flatten().collect();
    let mut unique = dedupe(flattened);
    sort_by_start(&mut unique);
    ResultEnvelope::new(
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        unique,
    )
}

pub fn aggregate(source_lists: Vec<Vec<Event>>) -> ResultEnvelope {
    assemble(source_lists, Utc::now())
}

pub async fn refresh(sources: &[SharedSource]) -> ResultEnvelope {
    let lists = fan_out(sources).await;
    let envelope = aggregate(lists);
    tracing::info!(total = envelope.total, "aggregated events");
    envelope
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use chrono::TimeZone;

    use super::*;
    use crate::testing::{sample_event, FailingSource, PanickingSource, SlowSource, StaticSource};

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 30, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn first_source_wins_cross_source_duplicates() {
        let mut luma = sample_event("Luma", "AI Hackathon", "2024-12-05T10:00:00Z");
        luma.description = Some("from luma".to_string());
        let mut meetup = sample_event("Meetup", "AI Hackathon", "2024-12-05T10:00:00Z");
        meetup.description = Some("from meetup".to_string());

        let envelope = assemble(vec![vec![luma.clone()], vec![meetup]], generated_at());
        assert_eq!(envelope.total, 1);
        assert_eq!(envelope.events, vec![luma]);
    }

    #[test]
    fn same_name_on_different_dates_is_kept() {
        let envelope = assemble(
            vec![vec![
                sample_event("Luma", "Hack Night", "2024-12-12T18:00:00Z"),
                sample_event("Luma", "Hack Night", "2024-12-05T18:00:00Z"),
            ]],
            generated_at(),
        );
        assert_eq!(envelope.total, 2);
        assert_eq!(envelope.events[0].start_date, "2024-12-05T18:00:00Z");
    }

    #[test]
    fn dedupe_is_case_sensitive_and_idempotent() {
        let events = vec![
            sample_event("Luma", "AI Hackathon", "2024-12-05T10:00:00Z"),
            sample_event("Meetup", "ai hackathon", "2024-12-05T10:00:00Z"),
            sample_event("Meetup", "AI Hackathon", "2024-12-05T10:00:00Z"),
        ];
        let once = dedupe(events);
        assert_eq!(once.len(), 2);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);

        let keys: HashSet<_> = once.iter().map(Event::dedup_key).collect();
        assert_eq!(keys.len(), once.len());
    }

    #[test]
    fn sorts_ascending_with_unparsable_last() {
        let mut events = vec![
            sample_event("Meetup", "Later", "2024-12-20T10:00:00Z"),
            sample_event("Meetup", "Mystery", "soon"),
            sample_event("Luma", "Earlier", "2024-12-01T10:00:00Z"),
            sample_event("Luma", "Also mystery", "tbd"),
            sample_event("Luma", "Same time A", "2024-12-10T10:00:00Z"),
            sample_event("Meetup", "Same time B", "2024-12-10T11:00:00+01:00"),
        ];
        sort_by_start(&mut events);
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Earlier",
                "Same time A",
                "Same time B",
                "Later",
                "Mystery",
                "Also mystery"
            ]
        );

        let parsed: Vec<_> = events
            .iter()
            .filter_map(|e| base::parse_start(&e.start_date))
            .collect();
        assert!(parsed.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn empty_sources_still_produce_an_envelope() {
        let envelope = assemble(vec![Vec::new(), Vec::new(), Vec::new()], generated_at());
        assert_eq!(envelope.total, 0);
        assert!(envelope.events.is_empty());
        assert_eq!(envelope.timestamp, "2024-11-30T12:00:00.000Z");
    }

    #[tokio::test]
    async fn failing_sources_do_not_poison_the_refresh() {
        let good = sample_event("Meetup", "Coding Dojo", "2024-12-14T09:00:00Z");
        let sources: Vec<SharedSource> = vec![
            Arc::new(FailingSource),
            Arc::new(PanickingSource),
            Arc::new(StaticSource::new("static", vec![good.clone()])),
        ];
        let envelope = refresh(&sources).await;
        assert_eq!(envelope.total, 1);
        assert_eq!(envelope.events, vec![good]);
    }

    #[tokio::test]
    async fn sources_run_concurrently() {
        let delay = Duration::from_millis(200);
        let sources: Vec<SharedSource> = vec![
            Arc::new(SlowSource::new("slow-a", delay)),
            Arc::new(SlowSource::new("slow-b", delay)),
            Arc::new(SlowSource::new("slow-c", delay)),
        ];
        let started = Instant::now();
        let lists = fan_out(&sources).await;
        assert_eq!(lists.len(), 3);
        assert!(started.elapsed() < delay * 3);
    }
}
