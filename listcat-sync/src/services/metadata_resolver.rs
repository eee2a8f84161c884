//! Metadata resolution chain
//!
//! Cache, then the metadata service as Series, then as Movie, then a degraded
//! scrape of the item's title page. Every outcome is cached, including "found
//! nothing", so an id is resolved over the network at most once.

use crate::models::{CanonicalMeta, ContentKind, FallbackRecord, MetadataRecord};
use crate::services::http_fetcher::PageFetcher;
use crate::services::metadata_cache::MetadataCache;
use crate::services::metadata_client::MetadataService;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

static LD_JSON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid ld+json selector")
});
static OG_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("valid og:title selector")
});
static OG_IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:image"]"#).expect("valid og:image selector")
});
static OG_TYPE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:type"]"#).expect("valid og:type selector")
});
static TITLE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(tt\d{7,})").expect("valid title id pattern"));
static OG_TITLE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:\([^)]*\d{4}[^)]*\))?\s*(?:[-|]\s*IMDb)?\s*$").expect("valid og title suffix")
});
static OG_TITLE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((?:[^)]*?)(\d{4})").expect("valid og title year"));

/// What the degraded title-page scrape recovered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitlePageGuess {
    pub name: Option<String>,
    pub poster: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<String>,
    pub kind: Option<ContentKind>,
    pub is_episode: bool,
    pub parent_id: Option<String>,
}

impl TitlePageGuess {
    fn kind_or_default(&self) -> ContentKind {
        self.kind.unwrap_or(ContentKind::Movie)
    }

    fn to_fallback(&self) -> FallbackRecord {
        FallbackRecord {
            name: self.name.clone(),
            poster: self.poster.clone(),
            release_date: self.release_date.clone(),
            year: self.year.clone(),
            kind: self.kind_or_default(),
        }
    }
}

pub struct MetadataResolver {
    service: Arc<dyn MetadataService>,
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<MetadataCache>,
    base_url: String,
    enrich_episodes_by_parent: bool,
}

impl MetadataResolver {
    pub fn new(
        service: Arc<dyn MetadataService>,
        fetcher: Arc<dyn PageFetcher>,
        cache: Arc<MetadataCache>,
        base_url: &str,
        enrich_episodes_by_parent: bool,
    ) -> Self {
        Self {
            service,
            fetcher,
            cache,
            base_url: base_url.trim_end_matches('/').to_string(),
            enrich_episodes_by_parent,
        }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Resolve one item id, consulting the cache first
    pub async fn resolve(&self, id: &str) -> MetadataRecord {
        if let Some(record) = self.cache.get(id) {
            return record;
        }

        if let Some(meta) = self.service.lookup(ContentKind::Series, id).await {
            debug!(item_id = %id, "Resolved as series");
            return self.cache.insert(
                id,
                MetadataRecord {
                    kind: ContentKind::Series,
                    meta: Some(meta),
                },
                None,
            );
        }

        if let Some(meta) = self.service.lookup(ContentKind::Movie, id).await {
            debug!(item_id = %id, "Resolved as movie");
            return self.cache.insert(
                id,
                MetadataRecord {
                    kind: ContentKind::Movie,
                    meta: Some(meta),
                },
                None,
            );
        }

        self.resolve_degraded(id).await
    }

    /// Resolve many ids with bounded concurrency
    pub async fn resolve_many(
        &self,
        ids: &[String],
        concurrency: usize,
    ) -> HashMap<String, MetadataRecord> {
        let pending = ids.iter().filter(|id| !self.cache.contains(id)).count();
        if pending > 0 {
            info!(items = ids.len(), pending, "Resolving metadata");
        }

        stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let record = self.resolve(&id).await;
                (id, record)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    async fn resolve_degraded(&self, id: &str) -> MetadataRecord {
        let url = format!("{}/title/{}/", self.base_url, id);
        let guess = match self.fetcher.fetch(&url).await {
            Ok(body) => parse_title_page(&body),
            Err(e) => {
                // Nothing else to go on, so the empty record sticks until purged
                warn!(
                    item_id = %id,
                    error = %e,
                    "Title page fetch failed, caching empty metadata until purge_metadata"
                );
                TitlePageGuess::default()
            }
        };

        if self.enrich_episodes_by_parent && guess.is_episode {
            if let Some(parent_id) = guess.parent_id.as_deref() {
                if let Some(parent) = self.service.lookup(ContentKind::Series, parent_id).await {
                    debug!(item_id = %id, parent_id = %parent_id, "Enriched episode from parent");
                    let own = CanonicalMeta {
                        name: guess.name.clone(),
                        release_date: guess.release_date.clone(),
                        year: guess.year.clone(),
                        parent_id: Some(parent_id.to_string()),
                        ..CanonicalMeta::default()
                    };
                    let meta = merge_meta(&parent, &own);
                    return self.cache.insert(
                        id,
                        MetadataRecord {
                            kind: ContentKind::Series,
                            meta: Some(meta),
                        },
                        None,
                    );
                }
            }
        }

        let fallback = guess.to_fallback();
        let fallback = fallback.is_displayable().then_some(fallback);
        debug!(item_id = %id, recovered = fallback.is_some(), "Degraded resolution");

        self.cache.insert(
            id,
            MetadataRecord {
                kind: guess.kind_or_default(),
                meta: None,
            },
            fallback,
        )
    }
}

/// Extract a best guess from a title page: JSON-LD first, then OpenGraph
pub fn parse_title_page(body: &str) -> TitlePageGuess {
    let document = Html::parse_document(body);
    let mut guess = TitlePageGuess::default();

    for script in document.select(&LD_JSON_SELECTOR) {
        let text = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            apply_json_ld(&mut guess, &value);
            break;
        }
    }

    if guess.name.is_none() {
        if let Some(title) = meta_content(&document, &OG_TITLE_SELECTOR) {
            if guess.year.is_none() {
                guess.year = OG_TITLE_YEAR
                    .captures(&title)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string());
            }
            let name = OG_TITLE_SUFFIX.replace(&title, "").trim().to_string();
            guess.name = (!name.is_empty()).then_some(name);
        }
    }
    if guess.poster.is_none() {
        guess.poster = meta_content(&document, &OG_IMAGE_SELECTOR);
    }
    if guess.kind.is_none() {
        if let Some(og_type) = meta_content(&document, &OG_TYPE_SELECTOR) {
            apply_type_hint(&mut guess, &og_type);
        }
    }
    if guess.year.is_none() {
        guess.year = guess
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string);
    }

    guess
}

fn apply_json_ld(guess: &mut TitlePageGuess, value: &Value) {
    if let Some(type_hint) = value.get("@type").and_then(Value::as_str) {
        apply_type_hint(guess, type_hint);
    }
    guess.name = value
        .get("name")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    guess.poster = match value.get("image") {
        Some(Value::String(url)) => Some(url.clone()),
        Some(Value::Object(obj)) => obj.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    guess.release_date = value
        .get("datePublished")
        .and_then(Value::as_str)
        .map(str::to_string);
    guess.parent_id = value
        .get("partOfSeries")
        .and_then(|series| {
            series
                .get("url")
                .or_else(|| series.get("@id"))
                .and_then(Value::as_str)
        })
        .and_then(|url| TITLE_ID_PATTERN.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase());
}

fn apply_type_hint(guess: &mut TitlePageGuess, hint: &str) {
    let hint = hint.to_ascii_lowercase();
    if hint.contains("episode") {
        guess.kind = Some(ContentKind::Series);
        guess.is_episode = true;
    } else if hint.contains("series") || hint.contains("tv_show") {
        guess.kind = Some(ContentKind::Series);
    } else if !hint.is_empty() {
        guess.kind = Some(ContentKind::Movie);
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

/// Overlay fields win; absent overlay fields keep the base value
pub fn merge_meta(base: &CanonicalMeta, overlay: &CanonicalMeta) -> CanonicalMeta {
    CanonicalMeta {
        name: overlay.name.clone().or_else(|| base.name.clone()),
        poster: overlay.poster.clone().or_else(|| base.poster.clone()),
        rating: overlay.rating.clone().or_else(|| base.rating.clone()),
        runtime: overlay.runtime.clone().or_else(|| base.runtime.clone()),
        release_date: overlay.release_date.clone().or_else(|| base.release_date.clone()),
        description: overlay.description.clone().or_else(|| base.description.clone()),
        year: overlay.year.clone().or_else(|| base.year.clone()),
        genres: if overlay.genres.is_empty() {
            base.genres.clone()
        } else {
            overlay.genres.clone()
        },
        parent_id: overlay.parent_id.clone().or_else(|| base.parent_id.clone()),
    }
}
