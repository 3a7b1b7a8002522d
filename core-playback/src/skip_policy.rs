//! # Failure-Skip Policy
//!
//! Decides what follows a failed track: a bounded re-resolution when the URL
//! was possibly stale, otherwise a delayed skip to the next track that has
//! not failed during this session, or a terminal stop.

use std::collections::HashSet;
use std::time::Duration;

use core_library::{Track, TrackKey};

use crate::config::PlayerConfig;
use crate::queue::{Queue, RepeatMode};
use crate::resolver::StreamOrigin;

/// Tracks that failed since the last fresh `play_track`.
#[derive(Debug, Clone, Default)]
pub struct FailedTracks {
    keys: HashSet<TrackKey>,
}

impl FailedTracks {
    pub fn mark(&mut self, track: &Track) -> bool {
        self.keys.insert(track.key())
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.keys.contains(&track.key())
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    /// Move to `index` once `delay` has passed.
    SkipTo { index: usize, delay: Duration },
    /// Nothing playable remains; stop once `delay` has passed.
    Exhausted { delay: Duration },
}

impl SkipDecision {
    pub fn delay(&self) -> Duration {
        match self {
            SkipDecision::SkipTo { delay, .. } | SkipDecision::Exhausted { delay } => *delay,
        }
    }

    pub fn target(&self) -> Option<usize> {
        match self {
            SkipDecision::SkipTo { index, .. } => Some(*index),
            SkipDecision::Exhausted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureSkipPolicy {
    auto_skip_delay: Duration,
    max_stale_retries: u32,
}

impl FailureSkipPolicy {
    pub fn new(auto_skip_delay: Duration, max_stale_retries: u32) -> Self {
        Self {
            auto_skip_delay,
            max_stale_retries,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.auto_skip_delay, config.max_stale_retries)
    }

    pub fn auto_skip_delay(&self) -> Duration {
        self.auto_skip_delay
    }

    /// Whether a sink rejection should be answered with a fresh resolution
    /// rather than a skip.
    pub fn should_retry(&self, origin: StreamOrigin, retries_so_far: u32) -> bool {
        origin.may_be_stale() && retries_so_far < self.max_stale_retries
    }

    /// Next candidate after the track at `failed_index`.
    ///
    /// Scans forward; wraps to the head only under [`RepeatMode::All`]. A
    /// track that already failed in this session is never chosen again.
    pub fn decide(
        &self,
        queue: &Queue,
        failed_index: usize,
        failed: &FailedTracks,
        repeat: RepeatMode,
    ) -> SkipDecision {
        let len = queue.len();
        let ahead = (failed_index.saturating_add(1)..len).collect::<Vec<_>>();
        let wrapped: Vec<usize> = if repeat == RepeatMode::All {
            (0..failed_index.min(len)).collect()
        } else {
            Vec::new()
        };

        let candidate = ahead
            .into_iter()
            .chain(wrapped)
            .find(|&index| queue.get(index).is_some_and(|track| !failed.contains(track)));

        match candidate {
            Some(index) => SkipDecision::SkipTo {
                index,
                delay: self.auto_skip_delay,
            },
            None => SkipDecision::Exhausted {
                delay: self.auto_skip_delay,
            },
        }
    }
}

impl Default for FailureSkipPolicy {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}
