//! # Playback Orchestration
//!
//! Turns a queue of tracks from heterogeneous backends into uninterrupted
//! audio on a host-provided sink.
//!
//! ## Overview
//!
//! This crate handles:
//! - Per-source stream resolution behind a [`SourceRegistry`]
//! - A TTL-bounded cache of resolved URLs with background prefetch
//! - Queue navigation with shuffle and repeat
//! - The [`PlaybackController`] state machine, which keeps at most one live
//!   sink handle and skips unplayable tracks automatically
//!
//! Audio decoding is out of scope: the host's [`AudioSink`] loads URLs.
//!
//! [`AudioSink`]: bridge_traits::playback::AudioSink

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod skip_policy;
pub mod source;

pub use cache::{CacheStats, StreamCache};
pub use config::{PlayerConfig, ResolverConfig};
pub use controller::{PlaybackController, PlaybackPhase, SessionSnapshot, TransitionOutcome};
pub use error::{PlaybackError, ResolutionError, Result};
pub use queue::{Queue, RepeatMode};
pub use resolver::{
    AudioHostStrategy, CatalogStrategy, ResolvedStream, StreamOrigin, StreamResolver,
    VideoHostStrategy,
};
pub use session::PlaybackSession;
pub use skip_policy::{FailedTracks, FailureSkipPolicy, SkipDecision};
pub use source::{ResolveHint, SourceDescriptor, SourceRegistry, SourceStrategy};
