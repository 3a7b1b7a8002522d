//! Catalog-aggregator resolution.
//!
//! Song metadata lists one download URL per bitrate tier; the best tier is
//! picked from the configured preference list.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_library::SourceKind;
use serde::Deserialize;
use tracing::debug;

use super::fetch_json;
use crate::error::ResolutionError;
use crate::source::{ResolveHint, SourceStrategy};

const BACKEND: SourceKind = SourceKind::CatalogAggregator;

#[derive(Debug, Deserialize)]
struct SongsResponse {
    #[serde(default)]
    data: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Vec<Song>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Song {
    #[serde(default)]
    download_url: Vec<DownloadUrl>,
}

#[derive(Debug, Clone, Deserialize)]
struct DownloadUrl {
    quality: String,
    url: String,
}

/// First tier in `preference` that is offered, else the last listed entry.
fn select_tier<'a>(downloads: &'a [DownloadUrl], preference: &[String]) -> Option<&'a DownloadUrl> {
    let usable: Vec<&DownloadUrl> = downloads.iter().filter(|d| !d.url.is_empty()).collect();

    preference
        .iter()
        .find_map(|tier| usable.iter().copied().find(|d| d.quality.eq_ignore_ascii_case(tier)))
        .or_else(|| usable.last().copied())
}

pub struct CatalogStrategy {
    http: Arc<dyn HttpClient>,
    base_url: String,
    quality_preference: Vec<String>,
    request_timeout: Duration,
}

impl CatalogStrategy {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        quality_preference: Vec<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quality_preference,
            request_timeout,
        }
    }

    fn pick(&self, songs: Vec<Song>) -> Option<String> {
        songs.iter().find_map(|song| {
            select_tier(&song.download_url, &self.quality_preference).map(|d| {
                debug!(quality = %d.quality, "Selected catalog tier");
                d.url.clone()
            })
        })
    }

    async fn by_id(&self, id: &str) -> Result<Option<String>, ResolutionError> {
        let request = HttpRequest::get(format!("{}/api/songs/{}", self.base_url, urlencoding::encode(id)))
            .timeout(self.request_timeout);
        let response: Option<SongsResponse> = fetch_json(self.http.as_ref(), request, BACKEND).await?;
        Ok(response.and_then(|r| self.pick(r.data)))
    }

    async fn by_search(&self, hint: &ResolveHint) -> Result<Option<String>, ResolutionError> {
        let query = hint.query();
        let request = HttpRequest::get(format!("{}/api/search/songs", self.base_url))
            .query(&[("query", query.as_str())])
            .timeout(self.request_timeout);
        let response: Option<SearchResponse> = fetch_json(self.http.as_ref(), request, BACKEND).await?;
        Ok(response.and_then(|r| self.pick(r.data.results)))
    }
}

#[async_trait]
impl SourceStrategy for CatalogStrategy {
    fn kind(&self) -> SourceKind {
        BACKEND
    }

    async fn resolve(&self, id: &str, hint: Option<&ResolveHint>) -> Result<String, ResolutionError> {
        if let Some(url) = self.by_id(id).await? {
            return Ok(url);
        }

        if let Some(hint) = hint {
            debug!(track_id = id, "Song lookup empty, searching by title");
            if let Some(url) = self.by_search(hint).await? {
                return Ok(url);
            }
        }

        Err(ResolutionError::Empty {
            backend: BACKEND,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers(qualities: &[&str]) -> Vec<DownloadUrl> {
        qualities
            .iter()
            .map(|q| DownloadUrl {
                quality: q.to_string(),
                url: format!("https://cdn/{q}.mp4"),
            })
            .collect()
    }

    fn preference() -> Vec<String> {
        vec!["320kbps".into(), "160kbps".into(), "96kbps".into()]
    }

    #[test]
    fn test_select_highest_preferred_tier() {
        let downloads = tiers(&["12kbps", "96kbps", "160kbps"]);
        assert_eq!(select_tier(&downloads, &preference()).unwrap().quality, "160kbps");
    }

    #[test]
    fn test_select_falls_back_to_last_entry() {
        let downloads = tiers(&["12kbps", "48kbps"]);
        assert_eq!(select_tier(&downloads, &preference()).unwrap().quality, "48kbps");
        assert!(select_tier(&[], &preference()).is_none());
    }

    #[test]
    fn test_song_payload_shape() {
        let parsed: SongsResponse = serde_json::from_str(
            r#"{"success":true,"data":[{"id":"abc","downloadUrl":[{"quality":"320kbps","url":"https://cdn/x"}]}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.data[0].download_url[0].quality, "320kbps");

        let search: SearchResponse =
            serde_json::from_str(r#"{"data":{"total":0,"results":[]}}"#).unwrap();
        assert!(search.data.results.is_empty());
    }
}
