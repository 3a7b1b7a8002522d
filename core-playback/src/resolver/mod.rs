//! # Stream Resolver
//!
//! Turns `(id, source)` into a directly playable URL.
//!
//! Resolution is cache-first. On a miss the request is dispatched to the
//! strategy registered for the track's source, bounded by the configured
//! timeout, and a successful result is written through to the
//! [`StreamCache`]. The resolver never falls back to another backend: the
//! source tag on a track is authoritative.
//!
//! [`StreamResolver::prefetch`] runs the same path for its cache side-effect
//! only. It never fails and is meant to be spawned.

mod audio_host;
mod catalog;
mod video_host;

pub use audio_host::AudioHostStrategy;
pub use catalog::CatalogStrategy;
pub use video_host::VideoHostStrategy;

use std::sync::Arc;

use bridge_traits::http::{HttpClient, HttpRequest};
use core_async::task::JoinHandle;
use core_async::time::timeout;
use core_library::{SourceKind, Track};
use core_runtime::logging::redact_url;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::cache::StreamCache;
use crate::config::ResolverConfig;
use crate::error::ResolutionError;
use crate::source::{ResolveHint, SourceRegistry};

/// Where a playable URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOrigin {
    /// Carried on the track itself.
    Provided,
    Cache,
    Backend,
}

impl StreamOrigin {
    /// Whether the URL may be stale and worth re-resolving on rejection.
    pub fn may_be_stale(&self) -> bool {
        !matches!(self, StreamOrigin::Backend)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub url: String,
    pub origin: StreamOrigin,
}

pub struct StreamResolver {
    registry: SourceRegistry,
    cache: Arc<StreamCache>,
    config: ResolverConfig,
}

impl StreamResolver {
    pub fn new(registry: SourceRegistry, config: ResolverConfig) -> Self {
        let cache = Arc::new(StreamCache::new(config.cache_capacity, config.cache_ttl));
        Self::with_cache(registry, cache, config)
    }

    pub fn with_cache(registry: SourceRegistry, cache: Arc<StreamCache>, config: ResolverConfig) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<StreamCache> {
        &self.cache
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `id`, returning a cached URL when one is fresh.
    pub async fn resolve(
        &self,
        id: &str,
        source: SourceKind,
        hint: Option<&ResolveHint>,
    ) -> Result<ResolvedStream, ResolutionError> {
        validate_id(id)?;

        if let Some(url) = self.cache.get(source, id) {
            debug!(track_id = id, %source, "Stream cache hit");
            return Ok(ResolvedStream {
                url,
                origin: StreamOrigin::Cache,
            });
        }

        self.resolve_fresh(id, source, hint).await
    }

    /// Resolve `id` against the backend, bypassing the cache.
    #[instrument(skip(self, hint))]
    pub async fn resolve_fresh(
        &self,
        id: &str,
        source: SourceKind,
        hint: Option<&ResolveHint>,
    ) -> Result<ResolvedStream, ResolutionError> {
        validate_id(id)?;

        let strategy = self.registry.strategy(source)?;
        let hint = hint.filter(|_| self.registry.descriptor(source).uses_hint);

        let url = timeout(self.config.resolve_timeout, strategy.resolve(id, hint))
            .await
            .map_err(|_| ResolutionError::Timeout {
                backend: source,
                timeout: self.config.resolve_timeout,
            })??;

        debug!(url = %redact_url(&url), "Resolved stream");
        self.cache.insert(source, id, url.clone());

        Ok(ResolvedStream {
            url,
            origin: StreamOrigin::Backend,
        })
    }

    pub async fn resolve_track(&self, track: &Track) -> Result<ResolvedStream, ResolutionError> {
        self.resolve(&track.id, track.source, Some(&ResolveHint::from_track(track)))
            .await
    }

    /// Forget the cached URL for `track` and resolve it again.
    pub async fn refresh_track(&self, track: &Track) -> Result<ResolvedStream, ResolutionError> {
        self.cache.invalidate(track.source, &track.id);
        self.resolve_fresh(&track.id, track.source, Some(&ResolveHint::from_track(track)))
            .await
    }

    /// Warm the cache for `id`. Returns whether a fresh URL is cached
    /// afterwards. Failures are logged, never returned.
    pub async fn prefetch(&self, id: &str, source: SourceKind, hint: Option<&ResolveHint>) -> bool {
        if self.cache.contains_fresh(source, id) {
            return true;
        }

        match self.resolve_fresh(id, source, hint).await {
            Ok(_) => {
                debug!(track_id = id, %source, "Prefetched stream");
                true
            }
            Err(e) => {
                warn!(track_id = id, %source, error = %e, "Prefetch failed");
                false
            }
        }
    }

    /// Prefetch `track` on a background task.
    pub fn spawn_prefetch(self: &Arc<Self>, track: &Track) -> JoinHandle<bool> {
        let resolver = Arc::clone(self);
        let id = track.id.clone();
        let source = track.source;
        let hint = ResolveHint::from_track(track);
        core_async::spawn(async move { resolver.prefetch(&id, source, Some(&hint)).await })
    }
}

fn validate_id(id: &str) -> Result<(), ResolutionError> {
    if id.trim().is_empty() {
        return Err(ResolutionError::InvalidRequest(
            "track id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// `GET` a JSON document. `Ok(None)` for 404, `Backend` for other non-2xx
/// statuses and undecodable bodies.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    http: &dyn HttpClient,
    request: HttpRequest,
    backend: SourceKind,
) -> Result<Option<T>, ResolutionError> {
    let url = redact_url(&request.url);
    let response = http
        .execute(request.accept_json())
        .await
        .map_err(|e| ResolutionError::from_bridge(backend, e))?;

    if response.status == 404 {
        debug!(%url, "Backend returned 404");
        return Ok(None);
    }
    if !response.is_success() {
        return Err(ResolutionError::Backend {
            backend,
            message: format!("HTTP {} from {}", response.status, url),
        });
    }

    response.json().map(Some).map_err(|e| ResolutionError::Backend {
        backend,
        message: e.to_string(),
    })
}
