//! # Library Module
//!
//! Domain records shared by every other crate, plus the two collaborator
//! surfaces the playback engine leans on without owning:
//!
//! - [`models`]: [`Track`], [`SourceKind`], [`Playlist`], [`HistoryEntry`]
//! - [`search`]: the [`CatalogSearch`] capability (free-text search and
//!   album/playlist expansion), injected by the host
//! - [`service`]: [`LibraryService`], persisting liked songs, play history
//!   and playlists as JSON through a `SettingsStore`
//!
//! The live playback session is never persisted here.

pub mod error;
pub mod models;
pub mod search;
pub mod service;

pub use error::{LibraryError, Result};
pub use models::{HistoryEntry, Playlist, PlaylistId, SourceKind, Track, TrackKey};
pub use search::CatalogSearch;
pub use service::LibraryService;
