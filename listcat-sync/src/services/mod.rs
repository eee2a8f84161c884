//! Service modules for the catalog sync engine
//!
//! Fetching and extraction at the bottom, the orchestrator and scheduler in
//! the middle, and the catalog service facing the query layer.

pub mod catalog;
pub mod extraction;
pub mod http_fetcher;
pub mod list_scraper;
pub mod metadata_cache;
pub mod metadata_client;
pub mod metadata_resolver;
pub mod ordering;
pub mod revision;
pub mod scheduler;
pub mod snapshot_store;
pub mod source_discoverer;
pub mod sync_orchestrator;

pub use catalog::{CatalogService, CatalogStatus};
pub use extraction::{ExtractionStrategy, LayoutMode, ListingStrategy};
pub use http_fetcher::{FetchError, HttpFetcher, PageFetcher};
pub use list_scraper::{ListScrape, ListScraper};
pub use metadata_cache::MetadataCache;
pub use metadata_client::{HttpMetadataService, MetadataService};
pub use metadata_resolver::MetadataResolver;
pub use ordering::sort_cards;
pub use revision::{catalog_fingerprint, RevisionTracker};
pub use scheduler::SyncScheduler;
pub use snapshot_store::SnapshotStore;
pub use source_discoverer::{SourceDiscoverer, SourceReference};
pub use sync_orchestrator::{SyncOrchestrator, SyncOutcome, SyncRequest};
