//! Data models for the catalog cache

pub mod list;
pub mod metadata;
pub mod preferences;
pub mod snapshot;
pub mod sync_state;

pub use list::{CatalogList, ListRef, ListSummary};
pub use metadata::{CanonicalMeta, Card, ContentKind, FallbackRecord, MetadataRecord};
pub use preferences::{Preferences, SortKey};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use sync_state::{RunGuard, SyncGate, SyncPhase};
