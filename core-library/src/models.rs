//! Domain models
//!
//! Records here are plain values. A [`Track`] is never mutated once built;
//! enriching it (for example with a resolved stream URL) produces a new value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Sources
// =============================================================================

/// Content backend a track originates from.
///
/// Source tagging is authoritative: a track is only ever resolved through
/// the backend named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Video-hosting platform; stream URLs are signed and expire.
    VideoHost,
    /// Audio-hosting platform.
    AudioHost,
    /// Music-catalog aggregator with bitrate tiers.
    CatalogAggregator,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::VideoHost,
        SourceKind::AudioHost,
        SourceKind::CatalogAggregator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::VideoHost => "video_host",
            SourceKind::AudioHost => "audio_host",
            SourceKind::CatalogAggregator => "catalog_aggregator",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video_host" => Ok(SourceKind::VideoHost),
            "audio_host" => Ok(SourceKind::AudioHost),
            "catalog_aggregator" => Ok(SourceKind::CatalogAggregator),
            other => Err(format!("Unknown source: {}", other)),
        }
    }
}

// =============================================================================
// Track
// =============================================================================

/// Identity of a track across sources. Ids are only unique within a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    pub source: SourceKind,
    pub id: String,
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

/// A playable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Identifier, unique within `source`
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Duration in seconds, when the source reports it
    #[serde(default, rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, rename = "thumbnail", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub source: SourceKind,
    /// Pre-resolved stream URL. Advisory only: it may have expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: SourceKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            duration_secs: None,
            thumbnail_url: None,
            source,
            stream_url: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration_secs(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// A copy of this track carrying a resolved stream URL.
    pub fn with_stream_url(&self, url: impl Into<String>) -> Self {
        Self {
            stream_url: Some(url.into()),
            ..self.clone()
        }
    }

    /// A copy without the pre-resolved URL, as persisted in history.
    pub fn without_stream_url(&self) -> Self {
        Self {
            stream_url: None,
            ..self.clone()
        }
    }

    pub fn key(&self) -> TrackKey {
        TrackKey {
            source: self.source,
            id: self.id.clone(),
        }
    }

    pub fn same_as(&self, other: &Track) -> bool {
        self.source == other.source && self.id == other.id
    }

    /// `"Title Artist"`, used as a disambiguation query by backends whose ids
    /// are not directly streamable.
    pub fn search_hint(&self) -> String {
        match &self.artist {
            Some(artist) if !artist.trim().is_empty() => format!("{} {}", self.title, artist),
            _ => self.title.clone(),
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_secs.map(|secs| u64::from(secs) * 1000)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Playlists and history
// =============================================================================

/// Unique identifier for a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub Uuid);

impl PlaylistId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PlaylistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PlaylistId::new(),
            name: name.into(),
            tracks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.tracks.iter().any(|t| t.same_as(track))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }
        if self.updated_at < self.created_at {
            return Err("Playlist updated_at precedes created_at".to_string());
        }
        Ok(())
    }
}

/// One play-history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub track: Track,
    pub played_at: DateTime<Utc>,
}
