//! # Source Registry
//!
//! Static knowledge about the three content backends, plus the mapping from
//! a [`SourceKind`] to the strategy that resolves its ids.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use core_library::{SourceKind, Track};

use crate::error::ResolutionError;

/// Title/artist pair used by backends whose ids are not directly streamable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveHint {
    pub title: String,
    pub artist: Option<String>,
}

impl ResolveHint {
    pub fn new(title: impl Into<String>, artist: Option<String>) -> Self {
        Self {
            title: title.into(),
            artist,
        }
    }

    pub fn from_track(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
        }
    }

    /// Free-text query, `"title artist"`.
    pub fn query(&self) -> String {
        match &self.artist {
            Some(artist) if !artist.trim().is_empty() => format!("{} {}", self.title, artist),
            _ => self.title.clone(),
        }
    }
}

/// Backend-specific resolution.
///
/// Implementations perform the network round-trips for one source and
/// return a direct media URL. Caching, timeouts and hint filtering happen in
/// [`StreamResolver`](crate::resolver::StreamResolver).
#[async_trait]
pub trait SourceStrategy: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn resolve(
        &self,
        id: &str,
        hint: Option<&ResolveHint>,
    ) -> Result<String, ResolutionError>;
}

/// Fixed facts about a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub label: &'static str,
    /// Title/artist disambiguation helps this backend.
    pub uses_hint: bool,
    /// Resolved URLs are signed and stop working after a while.
    pub urls_expire: bool,
}

impl SourceDescriptor {
    pub const fn of(kind: SourceKind) -> Self {
        match kind {
            SourceKind::VideoHost => Self {
                kind,
                label: "Video host",
                uses_hint: false,
                urls_expire: true,
            },
            SourceKind::AudioHost => Self {
                kind,
                label: "Audio host",
                uses_hint: true,
                urls_expire: false,
            },
            SourceKind::CatalogAggregator => Self {
                kind,
                label: "Catalog aggregator",
                uses_hint: true,
                urls_expire: false,
            },
        }
    }
}

/// Registered resolution strategies, at most one per source.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    strategies: HashMap<SourceKind, Arc<dyn SourceStrategy>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn SourceStrategy>) -> Self {
        self.register(strategy);
        self
    }

    /// Register `strategy` for its source, returning the one it replaces.
    pub fn register(&mut self, strategy: Arc<dyn SourceStrategy>) -> Option<Arc<dyn SourceStrategy>> {
        self.strategies.insert(strategy.kind(), strategy)
    }

    pub fn strategy(&self, kind: SourceKind) -> Result<Arc<dyn SourceStrategy>, ResolutionError> {
        self.strategies
            .get(&kind)
            .cloned()
            .ok_or(ResolutionError::UnsupportedSource(kind))
    }

    pub fn descriptor(&self, kind: SourceKind) -> SourceDescriptor {
        SourceDescriptor::of(kind)
    }

    pub fn is_registered(&self, kind: SourceKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    /// Registered sources in declaration order.
    pub fn registered(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.is_registered(*kind))
            .collect()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("registered", &self.registered())
            .finish()
    }
}
