//! Metadata records, degraded fallbacks and display cards

use serde::{Deserialize, Serialize};

/// Content kind
///
/// `Movie` is the primary kind, `Series` the secondary kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
}

impl ContentKind {
    /// Path segment used by the metadata service
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

/// Canonical metadata fields for one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalMeta {
    pub name: Option<String>,
    pub poster: Option<String>,
    /// Rating as published (e.g. "7.8")
    pub rating: Option<String>,
    /// Runtime as published (e.g. "142 min")
    pub runtime: Option<String>,
    /// Release date, ISO-8601 date or timestamp
    pub release_date: Option<String>,
    pub description: Option<String>,
    /// Release year or year range (e.g. "2010", "2008-2013")
    pub year: Option<String>,
    pub genres: Vec<String>,
    /// Parent series id when this item was enriched through its parent
    pub parent_id: Option<String>,
}

impl CanonicalMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Cached resolution result, keyed by item id
///
/// `meta: None` records a lookup that found nothing, so it is not retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub kind: ContentKind,
    #[serde(default)]
    pub meta: Option<CanonicalMeta>,
}

/// Minimal scrape-derived guess used when the metadata service had nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    pub kind: ContentKind,
}

impl FallbackRecord {
    /// True when at least one field is worth displaying
    pub fn is_displayable(&self) -> bool {
        self.name.is_some() || self.poster.is_some() || self.release_date.is_some()
    }
}

/// Display-ready projection of an item for the query layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub kind: ContentKind,
    pub name: Option<String>,
    pub poster: Option<String>,
    pub rating: Option<String>,
    pub runtime: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
}

impl Card {
    /// Card with nothing but an id
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: ContentKind::Movie,
            name: None,
            poster: None,
            rating: None,
            runtime: None,
            release_date: None,
            year: None,
            description: None,
            genres: Vec::new(),
        }
    }

    /// Build from the cached record, falling back to the degraded guess
    pub fn build(
        id: &str,
        record: Option<&MetadataRecord>,
        fallback: Option<&FallbackRecord>,
    ) -> Self {
        if let Some(MetadataRecord {
            kind,
            meta: Some(meta),
        }) = record
        {
            let year = meta
                .year
                .clone()
                .or_else(|| meta.release_date.as_deref().and_then(year_prefix));
            return Self {
                id: id.to_string(),
                kind: *kind,
                name: meta.name.clone(),
                poster: meta.poster.clone(),
                rating: meta.rating.clone(),
                runtime: meta.runtime.clone(),
                release_date: meta.release_date.clone(),
                year,
                description: meta.description.clone(),
                genres: meta.genres.clone(),
            };
        }

        let mut card = Self::placeholder(id);
        if let Some(record) = record {
            card.kind = record.kind;
        }
        if let Some(fb) = fallback {
            card.kind = fb.kind;
            card.name = fb.name.clone();
            card.poster = fb.poster.clone();
            card.release_date = fb.release_date.clone();
            card.year = fb
                .year
                .clone()
                .or_else(|| fb.release_date.as_deref().and_then(year_prefix));
        }
        card
    }
}

fn year_prefix(date: &str) -> Option<String> {
    let year: String = date.chars().take(4).collect();
    (year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())).then_some(year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ContentKind::Series).unwrap(), "\"series\"");
        assert_eq!(ContentKind::Movie.as_str(), "movie");
    }

    #[test]
    fn test_card_from_record() {
        let record = MetadataRecord {
            kind: ContentKind::Series,
            meta: Some(CanonicalMeta {
                name: Some("Show".into()),
                release_date: Some("2011-04-17T00:00:00.000Z".into()),
                ..CanonicalMeta::default()
            }),
        };
        let card = Card::build("tt0944947", Some(&record), None);
        assert_eq!(card.kind, ContentKind::Series);
        assert_eq!(card.name.as_deref(), Some("Show"));
        assert_eq!(card.year.as_deref(), Some("2011"));
    }

    #[test]
    fn test_card_uses_fallback_when_meta_missing() {
        let record = MetadataRecord {
            kind: ContentKind::Movie,
            meta: None,
        };
        let fallback = FallbackRecord {
            name: Some("Obscure".into()),
            poster: None,
            release_date: Some("1999-01-01".into()),
            year: None,
            kind: ContentKind::Series,
        };
        let card = Card::build("tt0000001", Some(&record), Some(&fallback));
        assert_eq!(card.name.as_deref(), Some("Obscure"));
        assert_eq!(card.kind, ContentKind::Series);
        assert_eq!(card.year.as_deref(), Some("1999"));
    }

    #[test]
    fn test_card_placeholder_without_anything() {
        let card = Card::build("tt0000001", None, None);
        assert_eq!(card, Card::placeholder("tt0000001"));
    }

    #[test]
    fn test_fallback_displayable() {
        let empty = FallbackRecord {
            name: None,
            poster: None,
            release_date: None,
            year: Some("2001".into()),
            kind: ContentKind::Movie,
        };
        assert!(!empty.is_displayable());
    }
}
