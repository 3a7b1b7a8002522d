//! # Playback Error Types
//!
//! Resolution failures are typed separately from controller errors because
//! the failure-skip policy consumes them as values: they become a `Failed`
//! phase and an auto-skip, never an `Err` returned to the host.

use std::time::Duration;

use bridge_traits::error::BridgeError;
use core_library::SourceKind;
use thiserror::Error;

/// Why a track id could not be turned into a playable URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Backend did not answer within the resolver bound.
    #[error("{backend} did not respond within {timeout:?}")]
    Timeout {
        backend: SourceKind,
        timeout: Duration,
    },

    /// Backend answered but offered no usable stream variant.
    #[error("{backend} offered no playable stream for '{id}'")]
    Empty { backend: SourceKind, id: String },

    /// Transport failure, non-2xx status or an unparseable payload.
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: SourceKind,
        message: String,
    },

    /// No strategy is registered for the track's source.
    #[error("No resolution strategy registered for {0}")]
    UnsupportedSource(SourceKind),

    #[error("Invalid resolution request: {0}")]
    InvalidRequest(String),
}

impl ResolutionError {
    /// Whether asking again later can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolutionError::Timeout { .. }
                | ResolutionError::Empty { .. }
                | ResolutionError::Backend { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResolutionError::Timeout { .. })
    }

    /// Map a transport error from the HTTP bridge.
    pub fn from_bridge(backend: SourceKind, error: BridgeError) -> Self {
        match error {
            BridgeError::Timeout(timeout) => ResolutionError::Timeout { backend, timeout },
            other => ResolutionError::Backend {
                backend,
                message: other.to_string(),
            },
        }
    }
}

/// Errors surfaced by the playback controller.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The native sink refused to load the resolved URL.
    #[error("Sink rejected stream: {0}")]
    SinkLoad(String),

    /// The sink reported a decode or network failure after loading.
    #[error("Playback failed: {0}")]
    SinkFailure(String),

    /// A control call (pause, seek) on the live sink handle failed.
    #[error("Sink control failed: {0}")]
    Sink(#[from] BridgeError),

    #[error("No track loaded")]
    NoTrackLoaded,

    #[error("Invalid queue: {0}")]
    InvalidQueue(String),

    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Errors the failure-skip policy reacts to.
    pub fn is_track_failure(&self) -> bool {
        matches!(
            self,
            PlaybackError::Resolution(_) | PlaybackError::SinkLoad(_) | PlaybackError::SinkFailure(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let timeout = ResolutionError::Timeout {
            backend: SourceKind::VideoHost,
            timeout: Duration::from_secs(10),
        };
        assert!(timeout.is_recoverable());
        assert!(timeout.is_timeout());

        assert!(ResolutionError::Empty {
            backend: SourceKind::AudioHost,
            id: "1".into()
        }
        .is_recoverable());
        assert!(!ResolutionError::UnsupportedSource(SourceKind::AudioHost).is_recoverable());
        assert!(!ResolutionError::InvalidRequest("empty id".into()).is_recoverable());
    }

    #[test]
    fn test_bridge_timeout_maps_to_resolution_timeout() {
        let err = ResolutionError::from_bridge(
            SourceKind::CatalogAggregator,
            BridgeError::Timeout(Duration::from_secs(3)),
        );
        assert_eq!(
            err,
            ResolutionError::Timeout {
                backend: SourceKind::CatalogAggregator,
                timeout: Duration::from_secs(3)
            }
        );

        let err = ResolutionError::from_bridge(
            SourceKind::VideoHost,
            BridgeError::OperationFailed("connection reset".into()),
        );
        assert!(matches!(err, ResolutionError::Backend { .. }));
    }

    #[test]
    fn test_track_failures() {
        assert!(PlaybackError::SinkLoad("403".into()).is_track_failure());
        assert!(PlaybackError::from(ResolutionError::InvalidRequest("x".into())).is_track_failure());
        assert!(!PlaybackError::NoTrackLoaded.is_track_failure());
    }
}
