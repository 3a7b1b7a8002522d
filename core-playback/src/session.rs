//! # Playback Session
//!
//! The single live association between a track and a native sink handle.
//! A controller owns at most one session; replacing it always releases the
//! previous one first.

use std::fmt;
use std::sync::Arc;

use bridge_traits::playback::{SinkHandle, SinkId, StatusSubscription};
use core_library::Track;
use tracing::{debug, warn};

pub struct PlaybackSession {
    generation: u64,
    track: Track,
    handle: Arc<dyn SinkHandle>,
    subscription: Option<StatusSubscription>,
}

impl PlaybackSession {
    pub(crate) fn new(
        generation: u64,
        track: Track,
        handle: Arc<dyn SinkHandle>,
        subscription: StatusSubscription,
    ) -> Self {
        Self {
            generation,
            track,
            handle,
            subscription: Some(subscription),
        }
    }

    /// Navigation generation that created this session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn sink_id(&self) -> SinkId {
        self.handle.id()
    }

    pub fn handle(&self) -> Arc<dyn SinkHandle> {
        Arc::clone(&self.handle)
    }

    /// Unsubscribe from status updates, then stop and unload the sink.
    /// Failures are logged; the handle is considered released either way.
    pub async fn release(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        release_handle(self.handle.as_ref()).await;
        debug!(
            generation = self.generation,
            track_id = %self.track.id,
            "Released playback session"
        );
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("generation", &self.generation)
            .field("track", &self.track.key())
            .field("sink", &self.handle.id())
            .finish()
    }
}

/// Stop and unload a handle that may never have been installed.
pub(crate) async fn release_handle(handle: &dyn SinkHandle) {
    if let Err(e) = handle.stop().await {
        debug!(sink = %handle.id(), error = %e, "Sink stop failed");
    }
    if let Err(e) = handle.unload().await {
        warn!(sink = %handle.id(), error = %e, "Sink unload failed");
    }
}
