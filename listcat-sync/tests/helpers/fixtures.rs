//! Fixture implementations of the upstream collaborators

use async_trait::async_trait;
use listcat_sync::models::{CanonicalMeta, ContentKind};
use listcat_sync::services::{FetchError, MetadataService, PageFetcher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Serves canned pages by exact url; anything else is a 404
#[derive(Default)]
pub struct FixtureFetcher {
    pages: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_page(&self, url: impl Into<String>, body: impl Into<String>) {
        self.pages.lock().unwrap().insert(url.into(), body.into());
    }

    pub fn remove_page(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}

/// Wraps a `FixtureFetcher`; once armed, holds the next fetch of one url until released
pub struct GatedFetcher {
    inner: Arc<FixtureFetcher>,
    gated: Mutex<Option<String>>,
    reached: Notify,
    release: Notify,
}

impl GatedFetcher {
    pub fn new(inner: Arc<FixtureFetcher>) -> Self {
        Self {
            inner,
            gated: Mutex::new(None),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn arm(&self, url: impl Into<String>) {
        *self.gated.lock().unwrap() = Some(url.into());
    }

    /// Resolves once the gated fetch is parked
    pub async fn wait_until_reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl PageFetcher for GatedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let hold = {
            let mut gated = self.gated.lock().unwrap();
            if gated.as_deref() == Some(url) {
                gated.take();
                true
            } else {
                false
            }
        };
        if hold {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.fetch(url).await
    }
}

/// Answers lookups from a fixed table and counts calls
#[derive(Default)]
pub struct StubMetadataService {
    answers: Mutex<HashMap<(ContentKind, String), CanonicalMeta>>,
    calls: AtomicUsize,
}

impl StubMetadataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, kind: ContentKind, id: &str, meta: CanonicalMeta) {
        self.answers
            .lock()
            .unwrap()
            .insert((kind, id.to_string()), meta);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataService for StubMetadataService {
    async fn lookup(&self, kind: ContentKind, id: &str) -> Option<CanonicalMeta> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .get(&(kind, id.to_string()))
            .cloned()
    }
}

/// A detail-layout page listing `ids`
pub fn list_page(ids: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="lister-item"><h3><a href="/title/{}/?ref_=ttls_li_tt">Title</a></h3></div>"#,
                id
            )
        })
        .collect();
    format!("<html><body><div class=\"lister-list\">{}</div></body></html>", items)
}

/// A page carrying only a heading, used for list name resolution
pub fn named_page(name: &str) -> String {
    format!("<html><head><title>{} - IMDb</title></head><body><h1>{}</h1></body></html>", name, name)
}
