//! Durable projection of the catalog cache

use super::{CatalogList, FallbackRecord, MetadataRecord, Preferences};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot document version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything persisted across restarts, written as one unit
///
/// Every field defaults, so older or partial documents still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub version: u32,
    pub lists: BTreeMap<String, CatalogList>,
    pub preferences: Preferences,
    pub metadata: BTreeMap<String, MetadataRecord>,
    pub fallbacks: BTreeMap<String, FallbackRecord>,
    pub revision: u64,
    pub last_sync: Option<DateTime<Utc>>,
    /// Last observed catalog fingerprint, so a restart does not bump revision
    pub fingerprint: Option<String>,
}
