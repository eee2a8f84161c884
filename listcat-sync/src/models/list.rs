//! Source lists and their committed item sequences

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A source list's identifying id plus its fetchable url
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRef {
    pub id: String,
    pub url: String,
    pub name: String,
}

/// A mirrored list
///
/// `items` never contains duplicates; order is scrape order with local edits
/// applied. `scraped` is the last scrape before any local edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogList {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub scraped: Vec<String>,
}

impl CatalogList {
    pub fn new(list_ref: &ListRef, items: Vec<String>) -> Self {
        let mut list = Self {
            id: list_ref.id.clone(),
            name: list_ref.name.clone(),
            url: list_ref.url.clone(),
            items: Vec::with_capacity(items.len()),
            scraped: Vec::new(),
        };
        list.append_unique(&items);
        list.scraped = list.items.clone();
        list
    }

    /// Fresh copy of this list built from its scraped items alone
    pub fn rebase(&self) -> Self {
        Self::new(&self.list_ref(), self.scraped.clone())
    }

    pub fn list_ref(&self) -> ListRef {
        ListRef {
            id: self.id.clone(),
            url: self.url.clone(),
            name: self.name.clone(),
        }
    }

    /// Append ids not already present, preserving append order
    pub fn append_unique(&mut self, ids: &[String]) -> usize {
        let mut seen: HashSet<String> = self.items.iter().cloned().collect();
        let before = self.items.len();
        for id in ids {
            if seen.insert(id.clone()) {
                self.items.push(id.clone());
            }
        }
        self.items.len() - before
    }

    /// Remove every id in `ids`; returns how many were dropped
    pub fn remove_all(&mut self, ids: &[String]) -> usize {
        let drop: HashSet<&String> = ids.iter().collect();
        let before = self.items.len();
        self.items.retain(|id| !drop.contains(id));
        before - self.items.len()
    }

    /// Apply the local overlay to scraped items
    ///
    /// Extras are appended after the scraped ids; anything in `removed` is
    /// filtered out last, so an id both added and removed stays out.
    pub fn apply_overlay(&mut self, extras: &[String], removed: &[String]) {
        self.append_unique(extras);
        self.remove_all(removed);
    }
}

/// Lightweight listing for the query layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    pub id: String,
    pub name: String,
    pub item_count: usize,
}

impl From<&CatalogList> for ListSummary {
    fn from(list: &CatalogList) -> Self {
        Self {
            id: list.id.clone(),
            name: list.name.clone(),
            item_count: list.items.len(),
        }
    }
}
