//! # Event Bus System
//!
//! Typed, broadcast-based notifications from the playback engine and the
//! library service to any number of observers (UI bindings, the history
//! recorder, analytics).
//!
//! ## Overview
//!
//! ```text
//! ┌────────────────────┐   emit    ┌───────────┐  subscribe  ┌─────────────────┐
//! │ PlaybackController ├──────────>│           ├────────────>│ UI binding      │
//! └────────────────────┘           │ EventBus  │             └─────────────────┘
//! ┌────────────────────┐   emit    │(broadcast)│  subscribe  ┌─────────────────┐
//! │ LibraryService     ├──────────>│           ├────────────>│ History recorder│
//! └────────────────────┘           └───────────┘             └─────────────────┘
//! ```
//!
//! Events are notifications, not commands: nothing in the engine waits for a
//! subscriber, and emitting with no subscribers is not an error worth
//! surfacing (callers typically `.ok()` the result).
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::ShuffleChanged { enabled: true }))
//!     .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Playback(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback-related events
    Playback(PlaybackEvent),
    /// Library-related events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. })
            | CoreEvent::Playback(PlaybackEvent::Skipped { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. })
            | CoreEvent::Playback(PlaybackEvent::Stopped { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Why a session ended without a follow-up track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `clear_player` was called.
    Cleared,
    /// Navigation ran past the end of the queue with repeat off.
    QueueExhausted,
    /// Every candidate track failed during this session.
    NoPlayableTracks,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Cleared => "cleared",
            StopReason::QueueExhausted => "queue_exhausted",
            StopReason::NoPlayableTracks => "no_playable_tracks",
        }
    }
}

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// "Now playing" moved to a new queue position. Emitted before the
    /// stream is resolved.
    TrackChanged {
        track_id: String,
        source: String,
        title: String,
        index: usize,
        queue_len: usize,
    },
    /// The sink accepted the stream and playback began.
    Started {
        track_id: String,
        source: String,
        title: String,
    },
    Paused {
        track_id: String,
        position_ms: u64,
    },
    Resumed {
        track_id: String,
        position_ms: u64,
    },
    /// The session ended with nothing queued to follow.
    Stopped {
        track_id: Option<String>,
        reason: StopReason,
    },
    /// The sink reported the end of the track.
    Completed {
        track_id: String,
    },
    /// Explicit seek.
    PositionChanged {
        track_id: String,
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// A failed track is being skipped automatically.
    Skipped {
        failed_track_id: String,
        next_track_id: String,
    },
    Error {
        track_id: Option<String>,
        message: String,
        /// Whether the failure-skip policy will try another track.
        recoverable: bool,
    },
    ShuffleChanged {
        enabled: bool,
    },
    RepeatModeChanged {
        mode: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Now playing changed",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::Skipped { .. } => "Skipped unplayable track",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::ShuffleChanged { .. } => "Shuffle toggled",
            PlaybackEvent::RepeatModeChanged { .. } => "Repeat mode changed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to persisted library lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    PlaylistCreated {
        playlist_id: String,
        name: String,
    },
    PlaylistUpdated {
        playlist_id: String,
        track_count: usize,
    },
    PlaylistDeleted {
        playlist_id: String,
    },
    TrackLiked {
        track_id: String,
    },
    TrackUnliked {
        track_id: String,
    },
    HistoryCleared,
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
            LibraryEvent::TrackLiked { .. } => "Track liked",
            LibraryEvent::TrackUnliked { .. } => "Track unliked",
            LibraryEvent::HistoryCleared => "History cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus. Subscribers falling more than `capacity`
    /// events behind receive `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Shorthand for emitting a [`PlaybackEvent`] and ignoring the
    /// no-subscriber case.
    pub fn publish_playback(&self, event: PlaybackEvent) {
        self.emit(CoreEvent::Playback(event)).ok();
    }

    /// Shorthand for emitting a [`LibraryEvent`] and ignoring the
    /// no-subscriber case.
    pub fn publish_library(&self, event: LibraryEvent) {
        self.emit(CoreEvent::Library(event)).ok();
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Started {
            track_id: id.to_string(),
            source: "video_host".to_string(),
            title: "Song".to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started("a")).is_err());
        // The shorthand swallows the same condition.
        bus.publish_playback(PlaybackEvent::ShuffleChanged { enabled: true });
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(started("a")).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), started("a"));
        assert_eq!(sub2.recv().await.unwrap(), started("a"));
    }

    #[tokio::test]
    async fn test_publish_helpers_wrap_category() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.publish_library(LibraryEvent::TrackLiked {
            track_id: "a".to_string(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            CoreEvent::Library(LibraryEvent::TrackLiked {
                track_id: "a".to_string(),
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(started(&format!("track-{i}"))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let terminal = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: None,
            message: "No playable tracks".to_string(),
            recoverable: false,
        });
        assert_eq!(terminal.severity(), EventSeverity::Error);

        let skipped = CoreEvent::Playback(PlaybackEvent::Skipped {
            failed_track_id: "a".to_string(),
            next_track_id: "b".to_string(),
        });
        assert_eq!(skipped.severity(), EventSeverity::Warning);

        let stopped = CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id: Some("b".to_string()),
            reason: StopReason::QueueExhausted,
        });
        assert_eq!(stopped.severity(), EventSeverity::Info);
        assert_eq!(stopped.description(), "Playback stopped");

        let seek = CoreEvent::Playback(PlaybackEvent::PositionChanged {
            track_id: "b".to_string(),
            position_ms: 5_000,
            duration_ms: Some(180_000),
        });
        assert_eq!(seek.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id: None,
            reason: StopReason::NoPlayableTracks,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "Stopped");
        assert_eq!(json["payload"]["reason"], "no_playable_tracks");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut stream = bus.subscribe();

        let handles: Vec<_> = (0..2)
            .map(|worker| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    for i in 0..10 {
                        bus.emit(started(&format!("{worker}-{i}"))).ok();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.ok();
        }

        let mut count = 0;
        while stream.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
