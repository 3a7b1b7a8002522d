//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges (HTTP, settings storage, the
//! native audio sink) into a ready-to-use player. [`CoreService::new`]
//! registers one resolution strategy per configured backend, builds the
//! playback controller and the library, and, when history is enabled,
//! records every started track. Desktop apps typically enable the
//! `desktop-shims` feature and call [`bootstrap_desktop`].

pub mod error;
mod history;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_async::sync::broadcast;
use core_async::task::JoinHandle;
use core_library::{CatalogSearch, LibraryService, SourceKind, Track};
use core_playback::{
    AudioHostStrategy, CatalogStrategy, PlaybackController, PlaybackError, PlayerConfig,
    ResolverConfig, SourceRegistry, StreamResolver, TransitionOutcome, VideoHostStrategy,
};
use core_runtime::config::{CoreConfig, EndpointConfig};
use core_runtime::events::{CoreEvent, EventBus};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Resolver and player tunables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl PlaybackSettings {
    pub fn validate(&self) -> Result<()> {
        self.resolver.validate().map_err(PlaybackError::Config)?;
        self.player.validate().map_err(PlaybackError::Config)?;
        Ok(())
    }
}

/// Everything the service needs from the host.
pub struct CoreDependencies {
    pub config: CoreConfig,
    /// Optional search/metadata provider.
    pub catalog_search: Option<Arc<dyn CatalogSearch>>,
}

impl CoreDependencies {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            catalog_search: None,
        }
    }

    pub fn with_catalog_search(mut self, search: Arc<dyn CatalogSearch>) -> Self {
        self.catalog_search = Some(search);
        self
    }
}

struct ServiceInner {
    player: PlaybackController,
    library: Arc<LibraryService>,
    resolver: Arc<StreamResolver>,
    events: EventBus,
    catalog_search: Option<Arc<dyn CatalogSearch>>,
    history_recorder: Option<JoinHandle<()>>,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        if let Some(task) = self.history_recorder.take() {
            task.abort();
        }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Build the service. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`CoreError::Playback`] when `settings` fail validation.
    pub fn new(deps: CoreDependencies, settings: PlaybackSettings) -> Result<Self> {
        settings.validate()?;

        let CoreDependencies {
            config,
            catalog_search,
        } = deps;

        let events = EventBus::new(config.event_buffer_size);

        let registry = build_registry(&config, &settings.resolver);
        if registry.registered().is_empty() {
            warn!("No stream sources configured; every track will fail to resolve");
        }
        let resolver = Arc::new(StreamResolver::new(registry, settings.resolver.clone()));

        let player_config = PlayerConfig {
            prefetch_next: settings.player.prefetch_next && config.features.enable_prefetch,
            ..settings.player.clone()
        };
        let player = PlaybackController::new(
            Arc::clone(&config.audio_sink),
            Arc::clone(&resolver),
            player_config,
            Some(events.clone()),
        );

        let library = Arc::new(
            LibraryService::new(Arc::clone(&config.settings_store), Arc::clone(&config.clock))
                .with_events(events.clone()),
        );

        let history_recorder = config.features.enable_history.then(|| {
            history::spawn_recorder(events.subscribe(), player.subscribe(), Arc::clone(&library))
        });

        info!(
            sources = ?resolver.registry().registered(),
            history = config.features.enable_history,
            prefetch = config.features.enable_prefetch,
            "Core service ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                player,
                library,
                resolver,
                events,
                catalog_search,
                history_recorder,
            }),
        })
    }

    pub fn player(&self) -> &PlaybackController {
        &self.inner.player
    }

    pub fn library(&self) -> &Arc<LibraryService> {
        &self.inner.library
    }

    pub fn resolver(&self) -> &Arc<StreamResolver> {
        &self.inner.resolver
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    fn catalog_search(&self) -> Result<&Arc<dyn CatalogSearch>> {
        self.inner
            .catalog_search
            .as_ref()
            .ok_or_else(|| CoreError::CapabilityMissing {
                capability: "CatalogSearch".to_string(),
                message: "Inject a search provider with CoreDependencies::with_catalog_search()"
                    .to_string(),
            })
    }

    /// Free-text search against one source, delegated to the host provider.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, source: SourceKind) -> Result<Vec<Track>> {
        Ok(self.catalog_search()?.search(query, source).await?)
    }

    /// Tracks of a catalog album or playlist, in album order.
    #[instrument(skip(self))]
    pub async fn collection_tracks(&self, collection_id: &str) -> Result<Vec<Track>> {
        Ok(self
            .catalog_search()?
            .collection_tracks(collection_id)
            .await?)
    }

    /// Expand a collection and play it from `start_index`.
    pub async fn play_collection(
        &self,
        collection_id: &str,
        start_index: usize,
    ) -> Result<TransitionOutcome> {
        let tracks = self.collection_tracks(collection_id).await?;
        let Some(track) = tracks.get(start_index).cloned() else {
            return Err(PlaybackError::InvalidQueue(format!(
                "collection '{}' has {} tracks, cannot start at {}",
                collection_id,
                tracks.len(),
                start_index
            ))
            .into());
        };

        Ok(self
            .inner
            .player
            .play_track(track, Some(tracks), Some(start_index))
            .await?)
    }
}

fn build_registry(config: &CoreConfig, resolver: &ResolverConfig) -> SourceRegistry {
    let endpoints: &EndpointConfig = &config.endpoints;
    let timeout = resolver.resolve_timeout;
    let mut registry = SourceRegistry::new();

    if endpoints.has_video_host() {
        registry.register(Arc::new(VideoHostStrategy::new(
            Arc::clone(&config.http_client),
            endpoints.video_host_instances.clone(),
            timeout,
        )));
    }

    if let (Some(base_url), Some(client_id)) = (
        &endpoints.audio_host_base_url,
        &endpoints.audio_host_client_id,
    ) {
        registry.register(Arc::new(AudioHostStrategy::new(
            Arc::clone(&config.http_client),
            base_url.clone(),
            client_id.clone(),
            timeout,
        )));
    }

    if let Some(base_url) = &endpoints.catalog_base_url {
        registry.register(Arc::new(CatalogStrategy::new(
            Arc::clone(&config.http_client),
            base_url.clone(),
            resolver.catalog_quality_preference.clone(),
            timeout,
        )));
    }

    registry
}

/// Convenience bootstrapper for desktop hosts: reqwest for HTTP and a
/// SQLite settings file in the platform data directory.
///
/// ```ignore
/// use core_runtime::config::EndpointConfig;
///
/// let endpoints = EndpointConfig::default().with_video_host_instance("https://pipedapi.example");
/// let core = core_service::bootstrap_desktop(Arc::new(MySink::new()), endpoints).await?;
/// core.player().play_track(track, None, None).await?;
/// ```
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap_desktop(
    audio_sink: Arc<dyn bridge_traits::playback::AudioSink>,
    endpoints: EndpointConfig,
) -> Result<CoreService> {
    let http_client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| CoreError::InitializationFailed(format!("HTTP client: {}", e)))?;
    let settings_store = bridge_desktop::SqliteSettingsStore::open_default()
        .await
        .map_err(|e| CoreError::InitializationFailed(format!("settings store: {}", e)))?;

    let config = CoreConfig::builder()
        .http_client(Arc::new(http_client))
        .settings_store(Arc::new(settings_store))
        .audio_sink(audio_sink)
        .endpoints(endpoints)
        .build()?;

    CoreService::new(CoreDependencies::new(config), PlaybackSettings::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_reject_zero_timeout() {
        let mut settings = PlaybackSettings::default();
        assert!(settings.validate().is_ok());

        settings.resolver.resolve_timeout = std::time::Duration::ZERO;
        assert!(matches!(
            settings.validate(),
            Err(CoreError::Playback(PlaybackError::Config(_)))
        ));
    }
}
