//! Source discovery
//!
//! Expands source references into list references. A user reference fetches
//! the user's lists page and collects every linked list; a list reference (id
//! or url) is normalized directly. Display names come from a second,
//! best-effort fetch of each list page and fall back to the list url.

use crate::ids;
use crate::models::ListRef;
use crate::services::http_fetcher::PageFetcher;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

static LIST_LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/list/(ls\d{6,})").expect("valid list link pattern"));

static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1").expect("valid heading selector"));
static OG_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("valid og:title selector")
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("valid title selector"));

const SITE_TITLE_SUFFIXES: [&str; 2] = [" - IMDb", " | IMDb"];

/// Classified source reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceReference {
    User(String),
    List(String),
    Unknown(String),
}

impl SourceReference {
    pub fn parse(raw: &str) -> Self {
        if let Some(id) = ids::extract_list_id(raw) {
            Self::List(id)
        } else if let Some(id) = ids::extract_user_id(raw) {
            Self::User(id)
        } else {
            Self::Unknown(raw.trim().to_string())
        }
    }
}

pub struct SourceDiscoverer {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    request_delay: Duration,
}

impl SourceDiscoverer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, base_url: &str, request_delay: Duration) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_delay,
        }
    }

    /// Canonical url of a list
    pub fn list_url(&self, list_id: &str) -> String {
        format!("{}/list/{}/", self.base_url, list_id)
    }

    fn user_lists_url(&self, user_id: &str) -> String {
        format!("{}/user/{}/lists", self.base_url, user_id)
    }

    /// Expand one reference
    ///
    /// `known_names` short-circuits the name fetch for lists already named.
    pub async fn discover(
        &self,
        reference: &str,
        known_names: &HashMap<String, String>,
    ) -> Vec<ListRef> {
        match SourceReference::parse(reference) {
            SourceReference::List(id) => {
                let url = self.list_url(&id);
                let name = match known_names.get(&id) {
                    Some(name) => name.clone(),
                    None => self.resolve_name(&url).await,
                };
                vec![ListRef { id, url, name }]
            }
            SourceReference::User(user_id) => self.discover_user(&user_id, known_names).await,
            SourceReference::Unknown(raw) => {
                warn!(reference = %raw, "Unrecognized source reference");
                Vec::new()
            }
        }
    }

    /// Expand every reference concurrently, dedup by list id (first wins)
    pub async fn discover_all(
        &self,
        references: &[String],
        known_names: &HashMap<String, String>,
    ) -> Vec<ListRef> {
        let results = join_all(
            references
                .iter()
                .map(|reference| self.discover(reference, known_names)),
        )
        .await;

        let mut seen = HashSet::new();
        let refs: Vec<ListRef> = results
            .into_iter()
            .flatten()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();

        info!(references = references.len(), lists = refs.len(), "Discovery finished");
        refs
    }

    async fn discover_user(
        &self,
        user_id: &str,
        known_names: &HashMap<String, String>,
    ) -> Vec<ListRef> {
        let url = self.user_lists_url(user_id);
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(user = %user_id, error = %e, "User page fetch failed");
                return Vec::new();
            }
        };

        let list_ids = extract_list_links(&body);
        debug!(user = %user_id, lists = list_ids.len(), "Found list links");

        let mut refs = Vec::with_capacity(list_ids.len());
        for id in list_ids {
            let url = self.list_url(&id);
            let name = match known_names.get(&id) {
                Some(name) => name.clone(),
                None => {
                    tokio::time::sleep(self.request_delay).await;
                    self.resolve_name(&url).await
                }
            };
            refs.push(ListRef { id, url, name });
        }
        refs
    }

    /// Best-effort display name; the url itself on failure
    async fn resolve_name(&self, url: &str) -> String {
        match self.fetcher.fetch(url).await {
            Ok(body) => extract_list_name(&body).unwrap_or_else(|| url.to_string()),
            Err(e) => {
                debug!(url = %url, error = %e, "List name fetch failed");
                url.to_string()
            }
        }
    }
}

/// List ids linked from a page, in page order, deduplicated
pub fn extract_list_links(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    LIST_LINK_PATTERN
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Display name from heading, then og:title, then <title>
pub fn extract_list_name(body: &str) -> Option<String> {
    let document = Html::parse_document(body);

    let heading = document
        .select(&HEADING_SELECTOR)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty());

    heading
        .or_else(|| {
            document
                .select(&OG_TITLE_SELECTOR)
                .filter_map(|el| el.value().attr("content"))
                .map(collapse_whitespace)
                .find(|text| !text.is_empty())
        })
        .or_else(|| {
            document
                .select(&TITLE_SELECTOR)
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .find(|text| !text.is_empty())
        })
        .map(|name| strip_site_suffix(&name))
        .filter(|name| !name.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_site_suffix(name: &str) -> String {
    SITE_TITLE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::http_fetcher::FetchError;
    use async_trait::async_trait;

    struct StaticFetcher(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.0.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    fn discoverer(pages: &[(&str, &str)]) -> SourceDiscoverer {
        let map = pages
            .iter()
            .map(|(u, b)| (u.to_string(), b.to_string()))
            .collect();
        SourceDiscoverer::new(
            Arc::new(StaticFetcher(map)),
            "https://www.imdb.com",
            Duration::ZERO,
        )
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            SourceReference::parse("https://www.imdb.com/list/ls100001/"),
            SourceReference::List("ls100001".into())
        );
        assert_eq!(
            SourceReference::parse("ur0012345"),
            SourceReference::User("ur0012345".into())
        );
        assert!(matches!(SourceReference::parse("hello"), SourceReference::Unknown(_)));
    }

    #[test]
    fn test_extract_list_name_fallbacks() {
        assert_eq!(
            extract_list_name("<html><body><h1>  Best \n Noir </h1></body></html>"),
            Some("Best Noir".to_string())
        );
        assert_eq!(
            extract_list_name(
                r#"<html><head><meta property="og:title" content="Horror Picks"></head></html>"#
            ),
            Some("Horror Picks".to_string())
        );
        assert_eq!(
            extract_list_name("<html><head><title>Weekend Queue - IMDb</title></head></html>"),
            Some("Weekend Queue".to_string())
        );
        assert_eq!(extract_list_name("<html></html>"), None);
    }

    #[test]
    fn test_extract_list_links_dedup() {
        let body = r#"<a href="/list/ls100002/">b</a><a href="/list/ls100001/">a</a><a href="/list/LS100002/?x">b</a>"#;
        assert_eq!(extract_list_links(body), vec!["ls100002", "ls100001"]);
    }

    #[tokio::test]
    async fn test_direct_list_reference() {
        let d = discoverer(&[(
            "https://www.imdb.com/list/ls100001/",
            "<h1>Classics</h1>",
        )]);
        let refs = d.discover("LS100001", &HashMap::new()).await;
        assert_eq!(
            refs,
            vec![ListRef {
                id: "ls100001".into(),
                url: "https://www.imdb.com/list/ls100001/".into(),
                name: "Classics".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_name_falls_back_to_url() {
        let d = discoverer(&[]);
        let refs = d.discover("ls100001", &HashMap::new()).await;
        assert_eq!(refs[0].name, "https://www.imdb.com/list/ls100001/");
    }

    #[tokio::test]
    async fn test_user_reference_expands() {
        let d = discoverer(&[
            (
                "https://www.imdb.com/user/ur0012345/lists",
                r#"<a href="/list/ls100001/">one</a><a href="/list/ls100002/">two</a>"#,
            ),
            ("https://www.imdb.com/list/ls100001/", "<h1>One</h1>"),
        ]);
        let mut known = HashMap::new();
        known.insert("ls100002".to_string(), "Two (cached)".to_string());

        let refs = d.discover("https://www.imdb.com/user/ur0012345/", &known).await;
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two (cached)"]);
    }

    #[tokio::test]
    async fn test_discover_all_dedups() {
        let d = discoverer(&[
            (
                "https://www.imdb.com/user/ur0012345/lists",
                r#"<a href="/list/ls100001/">one</a>"#,
            ),
            ("https://www.imdb.com/list/ls100001/", "<h1>One</h1>"),
        ]);
        let refs = d
            .discover_all(
                &["ls100001".to_string(), "ur0012345".to_string(), "???".to_string()],
                &HashMap::new(),
            )
            .await;
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "ls100001");
    }
}
