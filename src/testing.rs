//! Fake sources and cache stores shared by unit tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::Router;

use crate::cache::{CacheConnection, CacheError, CacheStore, MemoryStore};
use crate::models::Event;
use crate::scraping::EventSource;

/// Serves `router` on an ephemeral localhost port for the rest of the test.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    addr
}

/// A localhost address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    listener.local_addr().expect("test listener addr")
}

/// Request log kept by test servers: arrival time, path and headers.
#[derive(Clone, Default)]
pub struct Hits(Arc<Mutex<Vec<(Instant, String, HeaderMap)>>>);

impl Hits {
    pub fn record(&self, path: &str, headers: HeaderMap) {
        self.0
            .lock()
            .expect("hits lock")
            .push((Instant::now(), path.to_string(), headers));
    }

    pub fn take(&self) -> Vec<(Instant, String, HeaderMap)> {
        std::mem::take(&mut *self.0.lock().expect("hits lock"))
    }
}

pub fn sample_event(source: &str, name: &str, start_date: &str) -> Event {
    let slug = crate::utils::slugify(name);
    Event {
        id: format!("{}-{slug}", source.to_lowercase()),
        name: name.to_string(),
        description: None,
        start_date: start_date.to_string(),
        end_date: None,
        location: "Amsterdam".to_string(),
        url: format!("https://events.example.com/{slug}"),
        source: source.to_string(),
        tags: Some(Vec::new()),
    }
}

pub struct StaticSource {
    id: &'static str,
    events: Vec<Event>,
}

impl StaticSource {
    pub fn new(id: &'static str, events: Vec<Event>) -> Self {
        Self { id, events }
    }
}

#[async_trait]
impl EventSource for StaticSource {
    fn source_id(&self) -> &'static str {
        self.id
    }

    fn source_name(&self) -> &'static str {
        "Static"
    }

    fn source_url(&self) -> String {
        "https://events.example.com/".to_string()
    }

    async fn fetch(&self) -> Result<Vec<Event>> {
        Ok(self.events.clone())
    }
}

pub struct FailingSource;

#[async_trait]
impl EventSource for FailingSource {
    fn source_id(&self) -> &'static str {
        "failing"
    }

    fn source_name(&self) -> &'static str {
        "Failing"
    }

    fn source_url(&self) -> String {
        "https://unreachable.example.com/".to_string()
    }

    async fn fetch(&self) -> Result<Vec<Event>> {
        Err(anyhow!("connection refused"))
    }
}

pub struct PanickingSource;

#[async_trait]
impl EventSource for PanickingSource {
    fn source_id(&self) -> &'static str {
        "panicking"
    }

    fn source_name(&self) -> &'static str {
        "Panicking"
    }

    fn source_url(&self) -> String {
        "https://broken.example.com/".to_string()
    }

    async fn fetch(&self) -> Result<Vec<Event>> {
        panic!("unexpected markup")
    }
}

pub struct SlowSource {
    id: &'static str,
    delay: Duration,
}

impl SlowSource {
    pub fn new(id: &'static str, delay: Duration) -> Self {
        Self { id, delay }
    }
}

#[async_trait]
impl EventSource for SlowSource {
    fn source_id(&self) -> &'static str {
        self.id
    }

    fn source_name(&self) -> &'static str {
        "Slow"
    }

    fn source_url(&self) -> String {
        "https://slow.example.com/".to_string()
    }

    async fn fetch(&self) -> Result<Vec<Event>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

/// Refuses every connection.
pub struct UnreachableStore;

#[async_trait]
impl CacheStore for UnreachableStore {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError> {
        Err(CacheError::Connection("connection refused".to_string()))
    }
}

/// Wraps a [`MemoryStore`], counting opened and closed connections and
/// optionally failing writes.
#[derive(Clone, Default)]
pub struct TrackingStore {
    inner: MemoryStore,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail_writes: bool,
}

impl TrackingStore {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for TrackingStore {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError> {
        let inner = self.inner.connect().await?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackingConnection {
            inner,
            closed: self.closed.clone(),
            fail_writes: self.fail_writes,
        }))
    }
}

struct TrackingConnection {
    inner: Box<dyn CacheConnection>,
    closed: Arc<AtomicUsize>,
    fail_writes: bool,
}

#[async_trait]
impl CacheConnection for TrackingConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set_ex(&mut self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if self.fail_writes {
            return Err(CacheError::Command("READONLY replica".to_string()));
        }
        self.inner.set_ex(key, value, ttl).await
    }

    async fn close(self: Box<Self>) -> Result<(), CacheError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}
