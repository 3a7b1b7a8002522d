//! # Core Configuration Module
//!
//! Builder-based configuration for the playback core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds the host bridges the engine consumes plus the
//! endpoint and feature settings. [`CoreConfigBuilder::build`] fails fast
//! with [`Error::CapabilityMissing`] when a required bridge was not injected,
//! instead of failing at the first track load.
//!
//! ## Required Dependencies
//!
//! - `AudioSink` - always; there is no default audio output
//! - `HttpClient` - stream resolution (desktop default: reqwest)
//! - `SettingsStore` - library persistence (desktop default: SQLite)
//!
//! With the `desktop-shims` feature the HTTP client and settings store fall
//! back to the `bridge-desktop` implementations when not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, EndpointConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .audio_sink(Arc::new(MyNativeSink::new()))
//!     .http_client(Arc::new(MyHttpClient))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .endpoints(
//!         EndpointConfig::default()
//!             .with_video_host_instance("https://pipedapi.example.com")
//!             .with_catalog_base_url("https://saavn.example.com"),
//!     )
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioSink, Clock, HttpClient, SettingsStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub audio_sink: Arc<dyn AudioSink>,
    /// Wall clock for user-facing timestamps
    pub clock: Arc<dyn Clock>,
    pub endpoints: EndpointConfig,
    pub features: FeatureFlags,
    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("audio_sink", &"AudioSink { ... }")
            .field("endpoints", &self.endpoints)
            .field("features", &self.features)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Feature flags control optional behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Resolve the next queue entry in the background once a track starts
    pub enable_prefetch: bool,
    /// Record every started track into the persisted play history
    pub enable_history: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_prefetch: true,
            enable_history: true,
        }
    }
}

/// Backend endpoints used by the stream resolver.
///
/// A source is only resolvable when its endpoint is configured; tracks from
/// an unconfigured source fail with an unsupported-source error and are
/// skipped like any other unplayable track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Extraction API instances for the video host, tried in order
    pub video_host_instances: Vec<String>,
    /// Audio host API base URL
    pub audio_host_base_url: Option<String>,
    /// Public client id the audio host requires on every request
    pub audio_host_client_id: Option<String>,
    /// Catalog aggregator API base URL
    pub catalog_base_url: Option<String>,
}

impl EndpointConfig {
    pub fn with_video_host_instance(mut self, url: impl Into<String>) -> Self {
        self.video_host_instances.push(trim_base(url.into()));
        self
    }

    pub fn with_audio_host(mut self, base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        self.audio_host_base_url = Some(trim_base(base_url.into()));
        self.audio_host_client_id = Some(client_id.into());
        self
    }

    pub fn with_catalog_base_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_base_url = Some(trim_base(url.into()));
        self
    }

    pub fn has_video_host(&self) -> bool {
        !self.video_host_instances.is_empty()
    }

    pub fn has_audio_host(&self) -> bool {
        self.audio_host_base_url.is_some() && self.audio_host_client_id.is_some()
    }

    pub fn has_catalog(&self) -> bool {
        self.catalog_base_url.is_some()
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let urls = self
            .video_host_instances
            .iter()
            .chain(self.audio_host_base_url.iter())
            .chain(self.catalog_base_url.iter());

        for url in urls {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(Error::Config(format!(
                    "Endpoint '{}' must be an absolute http(s) URL",
                    url
                )));
            }
        }

        if self.audio_host_base_url.is_some() != self.audio_host_client_id.is_some() {
            return Err(Error::Config(
                "Audio host requires both a base URL and a client id".to_string(),
            ));
        }

        if matches!(&self.audio_host_client_id, Some(id) if id.trim().is_empty()) {
            return Err(Error::Config(
                "Audio host client id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.endpoints.validate()?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if !(self.endpoints.has_video_host()
            || self.endpoints.has_audio_host()
            || self.endpoints.has_catalog())
        {
            tracing::warn!("No stream backends configured; only tracks with a stream URL will play");
        }

        Ok(())
    }
}

fn audio_sink_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioSink".to_string(),
        message: "An AudioSink implementation is required to play anything. \
                 Inject the host's native player wrapper with .audio_sink()."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for stream resolution. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for liked songs, history and playlists. \
                 Desktop: enable the 'desktop-shims' feature to use SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use core_async::runtime::{Builder, Handle};
    use std::thread;

    let open = move || -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(async move {
                match path {
                    Some(path) => SqliteSettingsStore::new(path).await,
                    None => SqliteSettingsStore::open_default().await,
                }
            })
            .map_err(|e| Error::Internal(format!("Failed to open default SettingsStore: {}", e)))
    };

    // A runtime cannot be blocked on from inside another one.
    let store = if Handle::try_current().is_ok() {
        thread::spawn(open).join().map_err(|_| {
            Error::Internal("Settings store initialisation thread panicked".to_string())
        })??
    } else {
        open()?
    };

    Ok(Arc::new(store))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    audio_sink: Option<Arc<dyn AudioSink>>,
    clock: Option<Arc<dyn Clock>>,
    endpoints: EndpointConfig,
    features: FeatureFlags,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Location of the default SQLite settings database. Ignored when a
    /// settings store is injected.
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn enable_prefetch(mut self, enabled: bool) -> Self {
        self.features.enable_prefetch = enabled;
        self
    }

    pub fn enable_history(mut self, enabled: bool) -> Self {
        self.features.enable_history = enabled;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the audio sink is absent, or the
    ///   HTTP client / settings store are absent without `desktop-shims`
    /// - [`Error::Config`] when validation fails
    pub fn build(self) -> Result<CoreConfig> {
        let audio_sink = self.audio_sink.ok_or_else(audio_sink_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path)?,
        };

        let config = CoreConfig {
            http_client,
            settings_store,
            audio_sink,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            endpoints: self.endpoints,
            features: self.features,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
