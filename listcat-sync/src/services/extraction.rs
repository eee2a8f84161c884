//! HTML extraction strategies
//!
//! Each list layout mode is an [`ExtractionStrategy`]: it knows how to build
//! the first page url for its mode, pull item ids out of a page body and find
//! the next-page link. Markup changes upstream are handled by swapping or
//! adding a strategy, not by editing the scraper loop.

use crate::services::http_fetcher::{resolve_href, with_query_param};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fmt;

/// Rule A: title links
static TITLE_LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/title/(tt\d{7,})").expect("valid title link pattern"));

/// Rule B: data attributes carrying the id
static DATA_ATTR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)data-(?:tconst|const)\s*=\s*["'](tt\d{7,})["']"#)
        .expect("valid data attribute pattern")
});

static NEXT_PAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"a.next-page, a.lister-page-next, a[rel="next"], link[rel="next"], a.ipc-pagination-next"#,
    )
    .expect("valid next page selector")
});

/// Page layout modes, tried in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Detail,
    Grid,
    Plain,
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detail => f.write_str("detail"),
            Self::Grid => f.write_str("grid"),
            Self::Plain => f.write_str("plain"),
        }
    }
}

/// Per-mode extraction strategy
pub trait ExtractionStrategy: Send + Sync {
    fn mode(&self) -> LayoutMode;

    /// First page url for this mode
    fn first_page_url(&self, list_url: &str) -> String;

    /// Item ids on one page, in document order, deduplicated
    fn extract_ids(&self, body: &str) -> Vec<String>;

    /// Absolute url of the next page, if the page links one
    fn next_page_url(&self, body: &str, page_url: &str) -> Option<String>;
}

/// Listing layout selected through the `mode` query parameter
pub struct ListingStrategy {
    mode: LayoutMode,
}

impl ListingStrategy {
    pub fn new(mode: LayoutMode) -> Self {
        Self { mode }
    }
}

impl ExtractionStrategy for ListingStrategy {
    fn mode(&self) -> LayoutMode {
        self.mode
    }

    fn first_page_url(&self, list_url: &str) -> String {
        match self.mode {
            LayoutMode::Plain => list_url.to_string(),
            mode => with_query_param(list_url, "mode", &mode.to_string())
                .unwrap_or_else(|| list_url.to_string()),
        }
    }

    fn extract_ids(&self, body: &str) -> Vec<String> {
        extract_item_ids(body)
    }

    fn next_page_url(&self, body: &str, page_url: &str) -> Option<String> {
        find_next_page(body, page_url)
    }
}

/// Default strategy chain: detail, grid, plain
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(ListingStrategy::new(LayoutMode::Detail)),
        Box::new(ListingStrategy::new(LayoutMode::Grid)),
        Box::new(ListingStrategy::new(LayoutMode::Plain)),
    ]
}

/// Apply both extraction rules and merge by document position
pub fn extract_item_ids(body: &str) -> Vec<String> {
    let mut hits: Vec<(usize, String)> = TITLE_LINK_PATTERN
        .captures_iter(body)
        .chain(DATA_ATTR_PATTERN.captures_iter(body))
        .filter_map(|c| c.get(1))
        .map(|m| (m.start(), m.as_str().to_ascii_lowercase()))
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);

    let mut seen = HashSet::new();
    hits.into_iter()
        .filter_map(|(_, id)| seen.insert(id.clone()).then_some(id))
        .collect()
}

/// Locate the next-page link and resolve it against `page_url`
pub fn find_next_page(body: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(body);
    document
        .select(&NEXT_PAGE_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty() && *href != "#" && !href.starts_with("javascript:"))
        .and_then(|href| resolve_href(page_url, href))
}
