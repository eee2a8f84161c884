//! Error types for listcat-sync
//!
//! Component-level failures (network, parse) are absorbed into partial results
//! close to where they happen; only boundary and persistence failures surface
//! as `CatalogError`.

use thiserror::Error;

/// Catalog error taxonomy
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Input failed identifier validation; never enters the cache
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Scrape/discovery/metadata network failure
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Valid id or list with nothing behind it
    #[error("Not found: {0}")]
    NotFound(String),

    /// A sync trigger arrived while another run was active
    #[error("Sync already running")]
    ConcurrentSyncSkipped,

    /// Snapshot read/write failure
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
