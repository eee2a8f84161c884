//! User-controlled preference overlay
//!
//! Mutated by the administrative edit operations. The sync orchestrator only
//! prunes entries for lists that no longer exist.

use crate::ids;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Sort keys offered to the query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Pinned custom order, unpinned items after by name
    Custom,
    /// Scrape order, untouched
    Native,
    DateAsc,
    DateDesc,
    RatingAsc,
    RatingDesc,
    RuntimeAsc,
    RuntimeDesc,
    NameAsc,
    NameDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 10] = [
        SortKey::Custom,
        SortKey::Native,
        SortKey::DateAsc,
        SortKey::DateDesc,
        SortKey::RatingAsc,
        SortKey::RatingDesc,
        SortKey::RuntimeAsc,
        SortKey::RuntimeDesc,
        SortKey::NameAsc,
        SortKey::NameDesc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Native => "native",
            Self::DateAsc => "date_asc",
            Self::DateDesc => "date_desc",
            Self::RatingAsc => "rating_asc",
            Self::RatingDesc => "rating_desc",
            Self::RuntimeAsc => "runtime_asc",
            Self::RuntimeDesc => "runtime_desc",
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| format!("unknown sort key: {}", s))
    }
}

/// Preference overlay
///
/// Maps are ordered so their serialized form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Enabled list ids, in order; `None` means every list is enabled
    pub enabled: Option<Vec<String>>,
    /// Display order of list ids
    pub order: Vec<String>,
    pub default_list: Option<String>,
    /// Default sort per list
    pub sort: BTreeMap<String, SortKey>,
    /// Allowed sort options per list; absent means all allowed
    pub sort_options: BTreeMap<String, Vec<SortKey>>,
    /// Pinned item order per list
    pub custom_order: BTreeMap<String, Vec<String>>,
    /// Local additions per list
    pub extras: BTreeMap<String, Vec<String>>,
    /// Local removals per list
    pub removed: BTreeMap<String, Vec<String>>,
    /// Source references (user or list ids/urls)
    pub sources: Vec<String>,
    /// Blocked list ids
    pub blocked: Vec<String>,
}

impl Preferences {
    pub fn extras_for(&self, list_id: &str) -> &[String] {
        self.extras.get(list_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn removed_for(&self, list_id: &str) -> &[String] {
        self.removed.get(list_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn custom_order_for(&self, list_id: &str) -> &[String] {
        self.custom_order.get(list_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_blocked(&self, list_id: &str) -> bool {
        self.blocked.iter().any(|b| b == list_id)
    }

    pub fn is_enabled(&self, list_id: &str) -> bool {
        match &self.enabled {
            None => true,
            Some(enabled) => enabled.iter().any(|e| e == list_id),
        }
    }

    /// Record local additions; an added id is no longer removed
    pub fn add_extras(&mut self, list_id: &str, ids: &[String]) {
        strip(&mut self.removed, list_id, ids);
        let entry = self.extras.entry(list_id.to_string()).or_default();
        for id in ids {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
    }

    /// Record local removals; a removed id is no longer an extra or pinned
    pub fn add_removals(&mut self, list_id: &str, ids: &[String]) {
        strip(&mut self.extras, list_id, ids);
        strip(&mut self.custom_order, list_id, ids);
        let entry = self.removed.entry(list_id.to_string()).or_default();
        for id in ids {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
    }

    /// Forget every local edit for one list
    pub fn reset_list(&mut self, list_id: &str) {
        self.extras.remove(list_id);
        self.removed.remove(list_id);
        self.custom_order.remove(list_id);
    }

    pub fn block(&mut self, list_id: &str) {
        if !self.is_blocked(list_id) {
            self.blocked.push(list_id.to_string());
        }
        if let Some(enabled) = &mut self.enabled {
            enabled.retain(|id| id != list_id);
        }
        self.order.retain(|id| id != list_id);
        if self.default_list.as_deref() == Some(list_id) {
            self.default_list = None;
        }
    }

    /// Returns false when the list was not blocked
    pub fn unblock(&mut self, list_id: &str) -> bool {
        let before = self.blocked.len();
        self.blocked.retain(|id| id != list_id);
        before != self.blocked.len()
    }

    /// Drop references to lists not in `live`; returns true if anything changed
    ///
    /// An explicit selection stays explicit even when none of it is live.
    pub fn prune_missing(&mut self, live: &HashSet<String>) -> bool {
        let before = self.clone();
        if let Some(enabled) = &mut self.enabled {
            enabled.retain(|id| live.contains(id));
        }
        self.order.retain(|id| live.contains(id));
        self.custom_order.retain(|id, _| live.contains(id));
        self.sort.retain(|id, _| live.contains(id));
        self.sort_options.retain(|id, _| live.contains(id));
        if let Some(default) = &self.default_list {
            if !live.contains(default) {
                self.default_list = None;
            }
        }
        *self != before
    }

    /// Normalize user-supplied preferences
    ///
    /// Invalid ids are dropped, vectors deduplicated, extras made disjoint from
    /// removals (removal wins) and blocked lists taken out of enabled/order.
    pub fn sanitize(mut self) -> Self {
        self.enabled = self.enabled.as_deref().map(normalize_list_ids);
        self.order = normalize_list_ids(&self.order);
        self.blocked = normalize_list_ids(&self.blocked);
        self.default_list = self
            .default_list
            .as_deref()
            .and_then(|id| ids::normalize_list_id(id).ok());

        self.sort = self
            .sort
            .into_iter()
            .filter_map(|(list, key)| ids::normalize_list_id(&list).ok().map(|l| (l, key)))
            .collect();
        self.sort_options = self
            .sort_options
            .into_iter()
            .filter_map(|(list, mut keys)| {
                let list = ids::normalize_list_id(&list).ok()?;
                let mut seen = HashSet::new();
                keys.retain(|k| seen.insert(*k));
                Some((list, keys))
            })
            .collect();
        self.custom_order = normalize_item_map(self.custom_order);
        self.extras = normalize_item_map(self.extras);
        self.removed = normalize_item_map(self.removed);

        for (list, removed) in &self.removed {
            if let Some(extras) = self.extras.get_mut(list) {
                extras.retain(|id| !removed.contains(id));
            }
        }
        self.extras.retain(|_, v| !v.is_empty());

        let mut seen = HashSet::new();
        self.sources = self
            .sources
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        let blocked: HashSet<String> = self.blocked.iter().cloned().collect();
        if let Some(enabled) = &mut self.enabled {
            enabled.retain(|id| !blocked.contains(id));
        }
        self.order.retain(|id| !blocked.contains(id));
        if let Some(default) = &self.default_list {
            if blocked.contains(default) {
                self.default_list = None;
            }
        }
        self
    }
}

fn strip(map: &mut BTreeMap<String, Vec<String>>, list_id: &str, ids: &[String]) {
    if let Some(entry) = map.get_mut(list_id) {
        entry.retain(|id| !ids.contains(id));
        if entry.is_empty() {
            map.remove(list_id);
        }
    }
}

fn normalize_list_ids(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|id| ids::normalize_list_id(id).ok())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn normalize_item_map(map: BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    map.into_iter()
        .filter_map(|(list, items)| {
            let list = ids::normalize_list_id(&list).ok()?;
            let (items, _) = ids::partition_item_ids(&items);
            Some((list, items))
        })
        .collect()
}
