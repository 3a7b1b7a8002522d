//! Video-host extraction.
//!
//! Each configured extraction instance exposes `GET {instance}/streams/{id}`.
//! Instances are tried in order; the first one that answers with a usable
//! audio-only stream wins. The time budget is split evenly across instances
//! so a hung instance cannot starve the ones after it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_library::SourceKind;
use serde::Deserialize;
use tracing::{debug, warn};

use super::fetch_json;
use crate::error::ResolutionError;
use crate::source::{ResolveHint, SourceStrategy};

const BACKEND: SourceKind = SourceKind::VideoHost;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsResponse {
    #[serde(default)]
    audio_streams: Vec<AudioStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioStream {
    #[serde(default)]
    url: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    bitrate: Option<u64>,
    #[serde(default)]
    video_only: bool,
}

impl AudioStream {
    fn is_audio(&self) -> bool {
        !self.video_only
            && !self.url.is_empty()
            && self
                .mime_type
                .as_deref()
                .is_some_and(|mime| mime.starts_with("audio/"))
    }
}

/// Highest-bitrate audio-only variant.
fn best_audio(streams: &[AudioStream]) -> Option<&AudioStream> {
    streams
        .iter()
        .filter(|stream| stream.is_audio())
        .max_by_key(|stream| stream.bitrate.unwrap_or(0))
}

pub struct VideoHostStrategy {
    http: Arc<dyn HttpClient>,
    instances: Vec<String>,
    budget: Duration,
}

impl VideoHostStrategy {
    /// `budget` bounds one resolution across all instances.
    pub fn new(http: Arc<dyn HttpClient>, instances: Vec<String>, budget: Duration) -> Self {
        let instances = instances
            .into_iter()
            .map(|instance| instance.trim_end_matches('/').to_string())
            .filter(|instance| !instance.is_empty())
            .collect();
        Self {
            http,
            instances,
            budget,
        }
    }

    pub fn instances(&self) -> &[String] {
        &self.instances
    }

    /// Request timeout applied to each instance.
    pub fn instance_timeout(&self) -> Duration {
        let count = u32::try_from(self.instances.len()).unwrap_or(u32::MAX).max(1);
        self.budget / count
    }
}

#[async_trait]
impl SourceStrategy for VideoHostStrategy {
    fn kind(&self) -> SourceKind {
        BACKEND
    }

    async fn resolve(&self, id: &str, _hint: Option<&ResolveHint>) -> Result<String, ResolutionError> {
        if self.instances.is_empty() {
            return Err(ResolutionError::Backend {
                backend: BACKEND,
                message: "no extraction instances configured".to_string(),
            });
        }

        let timeout = self.instance_timeout();
        let mut saw_empty = false;
        let mut last_error = None;

        for instance in &self.instances {
            let request = HttpRequest::get(format!("{}/streams/{}", instance, urlencoding::encode(id)))
                .timeout(timeout);

            match fetch_json::<StreamsResponse>(self.http.as_ref(), request, BACKEND).await {
                Ok(Some(response)) => match best_audio(&response.audio_streams) {
                    Some(stream) => {
                        debug!(
                            %instance,
                            mime_type = stream.mime_type.as_deref().unwrap_or_default(),
                            bitrate = stream.bitrate.unwrap_or(0),
                            "Selected audio stream"
                        );
                        return Ok(stream.url.clone());
                    }
                    None => saw_empty = true,
                },
                Ok(None) => saw_empty = true,
                Err(e) => {
                    warn!(%instance, error = %e, "Extraction instance failed");
                    last_error = Some(e);
                }
            }
        }

        if saw_empty {
            return Err(ResolutionError::Empty {
                backend: BACKEND,
                id: id.to_string(),
            });
        }
        Err(last_error.unwrap_or_else(|| ResolutionError::Empty {
            backend: BACKEND,
            id: id.to_string(),
        }))
    }
}
