//! # Host Bridge Traits
//!
//! Capability contracts the playback core consumes but never implements.
//!
//! ## Overview
//!
//! The engine resolves stream URLs, drives a native audio player and persists
//! library lists, yet it owns none of the underlying primitives. Each of those
//! is a trait here, implemented once per host:
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Fetch with timeout; used by the stream
//!   resolver backends
//!
//! ### Audio
//! - [`AudioSink`](playback::AudioSink) - Creates a playable sound object for a
//!   URL
//! - [`SinkHandle`](playback::SinkHandle) - Controls one loaded sound object and
//!   reports its status through a subscription
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Namespaced string storage used
//!   for JSON-serialized playlists, liked songs and history
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source for timestamps
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! Missing capabilities are reported when the core is configured, not when they
//! are first used:
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .http_client(http)
//!     .settings_store(store)
//!     .build()?; // Err(CapabilityMissing { capability: "AudioSink", .. })
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared behind `Arc` between the controller, the prefetch tasks and the
//! library service.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{
    AudioSink, LoadOptions, SinkHandle, SinkId, SinkStatus, StatusCallback, StatusSubscription,
};
pub use storage::{MemorySettingsStore, SettingsStore};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
