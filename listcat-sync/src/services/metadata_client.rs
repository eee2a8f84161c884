//! Metadata service client
//!
//! The resolver only depends on [`MetadataService::lookup`]. The HTTP
//! implementation calls `{base}/meta/{kind}/{id}.json` and maps the `meta`
//! object onto [`CanonicalMeta`]. Every failure mode yields `None`.

use crate::models::{CanonicalMeta, ContentKind};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Typed metadata lookup
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Metadata for `id` under `kind`, or `None` when unavailable
    async fn lookup(&self, kind: ContentKind, id: &str) -> Option<CanonicalMeta>;
}

/// Response envelope
#[derive(Debug, Deserialize)]
struct MetaResponse {
    meta: Option<WireMeta>,
}

/// Wire shape of the `meta` object
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireMeta {
    name: Option<String>,
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    runtime: Option<String>,
    released: Option<String>,
    #[serde(rename = "releaseInfo")]
    release_info: Option<String>,
    year: Option<String>,
    description: Option<String>,
    genres: Option<Vec<String>>,
    genre: Option<Vec<String>>,
}

impl From<WireMeta> for CanonicalMeta {
    fn from(wire: WireMeta) -> Self {
        Self {
            name: non_empty(wire.name),
            poster: non_empty(wire.poster),
            rating: non_empty(wire.imdb_rating),
            runtime: non_empty(wire.runtime),
            release_date: non_empty(wire.released),
            description: non_empty(wire.description),
            year: non_empty(wire.year).or_else(|| non_empty(wire.release_info)),
            genres: wire.genres.or(wire.genre).unwrap_or_default(),
            parent_id: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// reqwest-backed metadata service
pub struct HttpMetadataService {
    client: Client,
    base_url: String,
}

impl HttpMetadataService {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn meta_url(&self, kind: ContentKind, id: &str) -> String {
        format!("{}/meta/{}/{}.json", self.base_url, kind.as_str(), id)
    }
}

#[async_trait]
impl MetadataService for HttpMetadataService {
    async fn lookup(&self, kind: ContentKind, id: &str) -> Option<CanonicalMeta> {
        let url = self.meta_url(kind, id);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(item_id = %id, kind = kind.as_str(), error = %e, "Metadata request failed");
                return None;
            }
        };

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                debug!(item_id = %id, kind = kind.as_str(), "Metadata not found");
                return None;
            }
            status => {
                warn!(item_id = %id, kind = kind.as_str(), status = %status, "Metadata service error");
                return None;
            }
        }

        match response.json::<MetaResponse>().await {
            Ok(MetaResponse { meta: Some(meta) }) => Some(meta.into()),
            Ok(MetaResponse { meta: None }) => {
                debug!(item_id = %id, kind = kind.as_str(), "Metadata response without meta");
                None
            }
            Err(e) => {
                warn!(item_id = %id, kind = kind.as_str(), error = %e, "Metadata parse failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_mapping() {
        let json = r#"{
            "meta": {
                "id": "tt0111161",
                "name": "The Shawshank Redemption",
                "imdbRating": "9.3",
                "runtime": "142 min",
                "released": "1994-10-14T00:00:00.000Z",
                "releaseInfo": "1994",
                "genres": ["Drama"],
                "poster": ""
            }
        }"#;
        let response: MetaResponse = serde_json::from_str(json).unwrap();
        let meta: CanonicalMeta = response.meta.unwrap().into();

        assert_eq!(meta.name.as_deref(), Some("The Shawshank Redemption"));
        assert_eq!(meta.rating.as_deref(), Some("9.3"));
        assert_eq!(meta.runtime.as_deref(), Some("142 min"));
        assert_eq!(meta.year.as_deref(), Some("1994"));
        assert_eq!(meta.genres, vec!["Drama".to_string()]);
        assert_eq!(meta.poster, None);
    }

    #[test]
    fn test_empty_envelope() {
        let response: MetaResponse = serde_json::from_str("{}").unwrap();
        assert!(response.meta.is_none());
    }

    #[test]
    fn test_meta_url() {
        let service =
            HttpMetadataService::new("https://meta.example/", "listcat-test", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            service.meta_url(ContentKind::Series, "tt0903747"),
            "https://meta.example/meta/series/tt0903747.json"
        );
    }
}
