//! Native audio sink contract.
//!
//! The core never decodes audio. It asks the host for "a playable sound
//! object for URL X", drives it through a small control surface and listens
//! to its status stream. Hosts wrap whatever their platform offers (an
//! `AVPlayer`, an `ExoPlayer`, a `rodio` sink) behind these two traits.
//!
//! Contract details the controller relies on:
//!
//! - [`AudioSink::setup`] is idempotent; the controller calls it lazily before
//!   the first load and may call it again.
//! - [`SinkStatus::did_just_finish`] is reported exactly once per completed
//!   track.
//! - [`SinkHandle::unload`] is safe to call at any point, including while the
//!   load is still in flight and after a previous `unload`.
//! - Dropping or [`StatusSubscription::unsubscribe`]-ing a subscription stops
//!   further callbacks; callbacks already running may still complete.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::error::Result;

/// Options supplied with a load request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Start playing as soon as enough media is buffered.
    pub autoplay: bool,
    /// Initial playback position.
    pub start_position: Duration,
    /// Initial volume (0.0 = muted, 1.0 = unity gain).
    pub volume: f32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            start_position: Duration::ZERO,
            volume: 1.0,
        }
    }
}

/// Status snapshot pushed by a sink handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_ms: u64,
    /// Unknown until the media header has been read.
    pub duration_ms: Option<u64>,
    pub did_just_finish: bool,
    pub is_buffering: bool,
    /// Decode or network failure reported after a successful load.
    pub error: Option<String>,
}

impl SinkStatus {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Callback invoked for every status update.
pub type StatusCallback = Box<dyn Fn(SinkStatus) + Send + Sync>;

/// Identity of one loaded sound object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(Uuid);

impl SinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Guard for a status subscription. Dropping it unsubscribes.
pub struct StatusSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl StatusSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Control surface of one loaded sound object.
#[async_trait::async_trait]
pub trait SinkHandle: Send + Sync {
    fn id(&self) -> SinkId;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Release native resources. Must tolerate repeated and mid-load calls.
    async fn unload(&self) -> Result<()>;

    async fn seek_to(&self, position_ms: u64) -> Result<()>;

    /// Register `callback` for status updates until the returned guard is
    /// dropped.
    fn on_status(&self, callback: StatusCallback) -> StatusSubscription;
}

/// Factory for sound objects.
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    /// One-time native initialisation (audio session category, mixing mode).
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    /// Create a sound object for `url` and load it.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MediaRejected`](crate::error::BridgeError::MediaRejected)
    /// when the media cannot be opened (unsupported format, HTTP 403 on an
    /// expired URL); other variants for transport failures.
    async fn create_and_load(&self, url: &str, options: LoadOptions) -> Result<Box<dyn SinkHandle>>;
}
