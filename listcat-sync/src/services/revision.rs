//! Catalog revision tracking
//!
//! The revision counts changes to the externally visible catalog shape. It is
//! derived from a fingerprint of the preferences that shape the catalog, so
//! metadata growth and no-op saves never bump it.

use crate::models::Preferences;
use sha2::{Digest, Sha256};

/// SHA-256 (hex) of the catalog-shaping preferences
pub fn catalog_fingerprint(prefs: &Preferences) -> String {
    let sort: Vec<String> = prefs
        .sort
        .iter()
        .map(|(list, key)| format!("{}={}", list, key))
        .collect();
    let sort_options: Vec<String> = prefs
        .sort_options
        .iter()
        .map(|(list, keys)| {
            let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
            format!("{}={}", list, keys.join("+"))
        })
        .collect();
    let pinned: usize = prefs.custom_order.values().map(Vec::len).sum();
    let extras_len = serde_json::to_vec(&prefs.extras).map(|v| v.len()).unwrap_or(0);
    let removed_len = serde_json::to_vec(&prefs.removed).map(|v| v.len()).unwrap_or(0);

    let enabled = match &prefs.enabled {
        Some(enabled) => enabled.join(","),
        None => "*".to_string(),
    };

    let material = [
        format!("enabled:{}", enabled),
        format!("order:{}", prefs.order.join(",")),
        format!("default:{}", prefs.default_list.as_deref().unwrap_or("")),
        format!("sort:{}", sort.join(",")),
        format!("options:{}", sort_options.join(",")),
        format!("pinned:{}", pinned),
        format!("extras:{}", extras_len),
        format!("removed:{}", removed_len),
    ]
    .join("|");

    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Monotonic revision counter keyed off the catalog fingerprint
#[derive(Debug, Clone)]
pub struct RevisionTracker {
    revision: u64,
    fingerprint: Option<String>,
}

/// Revision 0, with default preferences as the baseline
impl Default for RevisionTracker {
    fn default() -> Self {
        Self {
            revision: 0,
            fingerprint: Some(catalog_fingerprint(&Preferences::default())),
        }
    }
}

impl RevisionTracker {
    /// Resume from persisted state
    pub fn restore(revision: u64, fingerprint: Option<String>) -> Self {
        Self {
            revision,
            fingerprint,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Record the current preferences; returns true when the revision moved
    ///
    /// A tracker restored without a fingerprint takes its first observation
    /// as the baseline.
    pub fn observe(&mut self, prefs: &Preferences) -> bool {
        let fingerprint = catalog_fingerprint(prefs);
        match self.fingerprint.as_deref() {
            None => {
                self.fingerprint = Some(fingerprint);
                false
            }
            Some(previous) if previous == fingerprint => false,
            Some(_) => {
                self.fingerprint = Some(fingerprint);
                self.revision += 1;
                true
            }
        }
    }
}
