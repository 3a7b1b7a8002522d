//! Audio-host resolution.
//!
//! A single provider; when it is unavailable the failure is surfaced as is.
//! Non-numeric ids are disambiguated through a one-result search first when
//! a title/artist hint is available.

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

const BACKEND: SourceKind = SourceKind::AudioHost;

#[derive(Debug, Default, Deserialize)]
struct TrackStreams {
    #[serde(default)]
    http_mp3_128_url: Option<String>,
    #[serde(default)]
    hls_mp3_128_url: Option<String>,
    #[serde(default)]
    hls_opus_64_url: Option<String>,
}

impl TrackStreams {
    /// Progressive MP3, then HLS MP3, then HLS Opus.
    fn preferred(self) -> Option<String> {
        [self.http_mp3_128_url, self.hls_mp3_128_url, self.hls_opus_64_url]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    collection: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
}

pub struct AudioHostStrategy {
    http: Arc<dyn HttpClient>,
    base_url: String,
    client_id: String,
    request_timeout: Duration,
}

impl AudioHostStrategy {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            request_timeout,
        }
    }

    fn request(&self, path: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{}", self.base_url, path))
            .query(&[("client_id", self.client_id.as_str())])
            .timeout(self.request_timeout)
    }

    async fn search_id(&self, hint: &ResolveHint) -> Result<Option<String>, ResolutionError> {
        let query = hint.query();
        let request = self
            .request("/search/tracks")
            .query(&[("q", query.as_str()), ("limit", "1")]);

        let response: Option<SearchResponse> = fetch_json(self.http.as_ref(), request, BACKEND).await?;
        Ok(response
            .and_then(|r| r.collection.into_iter().next())
            .map(|hit| hit.id.to_string()))
    }
}

#[async_trait]
impl SourceStrategy for AudioHostStrategy {
    fn kind(&self) -> SourceKind {
        BACKEND
    }

    async fn resolve(&self, id: &str, hint: Option<&ResolveHint>) -> Result<String, ResolutionError> {
        let track_id = match hint {
            Some(hint) if !is_numeric(id) => {
                let found = self.search_id(hint).await?;
                debug!(original_id = id, resolved_id = ?found, "Disambiguated by search");
                found.ok_or_else(|| ResolutionError::Empty {
                    backend: BACKEND,
                    id: id.to_string(),
                })?
            }
            _ => id.to_string(),
        };

        let path = format!("/tracks/{}/streams", urlencoding::encode(&track_id));
        let streams: Option<TrackStreams> =
            fetch_json(self.http.as_ref(), self.request(&path), BACKEND).await?;

        streams
            .and_then(TrackStreams::preferred)
            .ok_or_else(|| ResolutionError::Empty {
                backend: BACKEND,
                id: id.to_string(),
            })
    }
}

fn is_numeric(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_preference_order() {
        let streams = TrackStreams {
            http_mp3_128_url: None,
            hls_mp3_128_url: Some("https://hls/mp3".into()),
            hls_opus_64_url: Some("https://hls/opus".into()),
        };
        assert_eq!(streams.preferred().as_deref(), Some("https://hls/mp3"));

        let streams = TrackStreams {
            http_mp3_128_url: Some(String::new()),
            hls_mp3_128_url: None,
            hls_opus_64_url: Some("https://hls/opus".into()),
        };
        assert_eq!(streams.preferred().as_deref(), Some("https://hls/opus"));

        assert_eq!(TrackStreams::default().preferred(), None);
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("123456"));
        assert!(!is_numeric("artist/track-name"));
        assert!(!is_numeric(""));
    }
}
