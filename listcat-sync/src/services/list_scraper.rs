//! List scraper
//!
//! Fetches a list's paginated pages and extracts ordered item ids. Layout
//! modes are tried in order; the first mode that yields any id wins and modes
//! are never merged. Pagination within a mode is strictly sequential with a
//! mandatory delay between fetches.
//!
//! Best-effort: a failed page ends that mode's pagination and keeps whatever
//! was gathered. `scrape_list` never returns an error; it reports whether any
//! page could be fetched at all so callers can tell an empty list from an
//! unreachable one.

use crate::services::extraction::{default_strategies, ExtractionStrategy};
use crate::services::http_fetcher::PageFetcher;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of scraping one list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScrape {
    /// Ordered, deduplicated item ids
    pub ids: Vec<String>,
    /// At least one page fetch succeeded
    pub reachable: bool,
}

pub struct ListScraper {
    fetcher: Arc<dyn PageFetcher>,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    max_pages: usize,
    page_delay: Duration,
}

impl ListScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_pages: usize, page_delay: Duration) -> Self {
        Self::with_strategies(fetcher, default_strategies(), max_pages, page_delay)
    }

    pub fn with_strategies(
        fetcher: Arc<dyn PageFetcher>,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        max_pages: usize,
        page_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            strategies,
            max_pages: max_pages.max(1),
            page_delay,
        }
    }

    /// Ordered, deduplicated item ids for one list url
    pub async fn scrape_list(&self, url: &str) -> ListScrape {
        let mut first_fetch = true;
        let mut reachable = false;

        for strategy in &self.strategies {
            let ids = self
                .scrape_mode(strategy.as_ref(), url, &mut first_fetch, &mut reachable)
                .await;
            if !ids.is_empty() {
                info!(
                    url = %url,
                    mode = %strategy.mode(),
                    items = ids.len(),
                    "Scraped list"
                );
                return ListScrape {
                    ids,
                    reachable: true,
                };
            }
            debug!(url = %url, mode = %strategy.mode(), "Mode yielded no ids, falling through");
        }

        if reachable {
            info!(url = %url, "List pages fetched but no ids found");
        } else {
            warn!(url = %url, "No page of this list could be fetched");
        }
        ListScrape {
            ids: Vec::new(),
            reachable,
        }
    }

    async fn scrape_mode(
        &self,
        strategy: &dyn ExtractionStrategy,
        list_url: &str,
        first_fetch: &mut bool,
        reachable: &mut bool,
    ) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(strategy.first_page_url(list_url));
        let mut pages = 0usize;

        while let Some(page_url) = next.take() {
            if pages >= self.max_pages {
                debug!(url = %list_url, max_pages = self.max_pages, "Page ceiling reached");
                break;
            }
            if !visited.insert(page_url.clone()) {
                debug!(url = %page_url, "Next link points at a visited page");
                break;
            }

            if !*first_fetch {
                tokio::time::sleep(self.page_delay).await;
            }
            *first_fetch = false;
            pages += 1;

            let body = match self.fetcher.fetch(&page_url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        url = %page_url,
                        mode = %strategy.mode(),
                        error = %e,
                        "Page fetch failed, ending pagination for this mode"
                    );
                    break;
                }
            };
            *reachable = true;

            let before = ids.len();
            for id in strategy.extract_ids(&body) {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
            let added = ids.len() - before;

            debug!(url = %page_url, page = pages, added, "Scraped page");

            if added == 0 {
                break;
            }
            next = strategy.next_page_url(&body, &page_url);
        }

        ids
    }
}
