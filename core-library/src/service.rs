//! Persisted library lists.
//!
//! Liked songs, play history and playlists are stored as JSON arrays under
//! fixed namespace keys of the host [`SettingsStore`]. Every mutating call is
//! a read-modify-write of one namespace, serialized through a single async
//! lock so concurrent toggles cannot lose each other's updates.

use std::sync::Arc;

use bridge_traits::{Clock, SettingsStore};
use core_async::sync::Mutex;
use core_runtime::events::{EventBus, LibraryEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{LibraryError, Result};
use crate::models::{HistoryEntry, Playlist, PlaylistId, Track};

pub const PLAYLISTS_KEY: &str = "@library/playlists";
pub const LIKED_SONGS_KEY: &str = "@library/liked_songs";
pub const HISTORY_KEY: &str = "@library/history";

/// Default number of history entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

pub struct LibraryService {
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
    history_limit: usize,
    write_lock: Mutex<()>,
}

impl LibraryService {
    pub fn new(store: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            events: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(events) = &self.events {
            events.publish_library(event);
        }
    }

    async fn load_list<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>> {
        let Some(raw) = self.store.get_string(namespace).await? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            warn!(namespace, error = %e, "Stored library data failed to decode");
            LibraryError::Corrupted {
                namespace: namespace.to_string(),
                message: e.to_string(),
            }
        })
    }

    async fn save_list<T: Serialize>(&self, namespace: &str, items: &[T]) -> Result<()> {
        let raw = serde_json::to_string(items)
            .map_err(|e| LibraryError::Serialization(e.to_string()))?;
        self.store.set_string(namespace, &raw).await?;
        debug!(namespace, count = items.len(), "Saved library list");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Liked songs
    // ------------------------------------------------------------------

    pub async fn load_liked_songs(&self) -> Result<Vec<Track>> {
        self.load_list(LIKED_SONGS_KEY).await
    }

    pub async fn save_liked_songs(&self, tracks: &[Track]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let stripped: Vec<Track> = tracks.iter().map(Track::without_stream_url).collect();
        self.save_list(LIKED_SONGS_KEY, &stripped).await
    }

    /// Like or unlike `track`. Returns whether it is liked afterwards.
    ///
    /// Newly liked tracks go to the front of the list.
    #[instrument(skip(self, track), fields(track_id = %track.id, source = %track.source))]
    pub async fn toggle_like(&self, track: &Track) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut liked: Vec<Track> = self.load_list(LIKED_SONGS_KEY).await?;

        let now_liked = match liked.iter().position(|t| t.same_as(track)) {
            Some(pos) => {
                liked.remove(pos);
                false
            }
            None => {
                liked.insert(0, track.without_stream_url());
                true
            }
        };

        self.save_list(LIKED_SONGS_KEY, &liked).await?;
        self.emit(if now_liked {
            LibraryEvent::TrackLiked {
                track_id: track.id.clone(),
            }
        } else {
            LibraryEvent::TrackUnliked {
                track_id: track.id.clone(),
            }
        });
        Ok(now_liked)
    }

    pub async fn is_liked(&self, track: &Track) -> Result<bool> {
        let liked: Vec<Track> = self.load_list(LIKED_SONGS_KEY).await?;
        Ok(liked.iter().any(|t| t.same_as(track)))
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Record a play. The most recent play comes first; an earlier entry for
    /// the same track is replaced, and the list is capped at the history
    /// limit.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn record_play(&self, track: &Track) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut history: Vec<HistoryEntry> = self.load_list(HISTORY_KEY).await?;

        history.retain(|entry| !entry.track.same_as(track));
        history.insert(
            0,
            HistoryEntry {
                track: track.without_stream_url(),
                played_at: self.clock.now(),
            },
        );
        history.truncate(self.history_limit);

        self.save_list(HISTORY_KEY, &history).await
    }

    pub async fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        self.load_list(HISTORY_KEY).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(HISTORY_KEY).await?;
        self.emit(LibraryEvent::HistoryCleared);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------

    pub async fn load_playlists(&self) -> Result<Vec<Playlist>> {
        self.load_list(PLAYLISTS_KEY).await
    }

    pub async fn save_playlists(&self, playlists: &[Playlist]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save_list(PLAYLISTS_KEY, playlists).await
    }

    pub async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        let name = validate_name(name)?;
        let _guard = self.write_lock.lock().await;

        let mut playlists: Vec<Playlist> = self.load_list(PLAYLISTS_KEY).await?;
        let playlist = Playlist::new(name, self.clock.now());
        playlists.push(playlist.clone());
        self.save_list(PLAYLISTS_KEY, &playlists).await?;

        self.emit(LibraryEvent::PlaylistCreated {
            playlist_id: playlist.id.to_string(),
            name: playlist.name.clone(),
        });
        Ok(playlist)
    }

    pub async fn rename_playlist(&self, id: PlaylistId, name: &str) -> Result<Playlist> {
        let name = validate_name(name)?;
        self.update_playlist(id, |playlist| {
            playlist.name = name;
            true
        })
        .await
    }

    pub async fn delete_playlist(&self, id: PlaylistId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut playlists: Vec<Playlist> = self.load_list(PLAYLISTS_KEY).await?;

        let before = playlists.len();
        playlists.retain(|p| p.id != id);
        if playlists.len() == before {
            return Err(playlist_not_found(id));
        }

        self.save_list(PLAYLISTS_KEY, &playlists).await?;
        self.emit(LibraryEvent::PlaylistDeleted {
            playlist_id: id.to_string(),
        });
        Ok(())
    }

    /// Append `track` unless the playlist already holds it.
    pub async fn add_to_playlist(&self, id: PlaylistId, track: &Track) -> Result<Playlist> {
        self.update_playlist(id, |playlist| {
            if playlist.contains(track) {
                return false;
            }
            playlist.tracks.push(track.without_stream_url());
            true
        })
        .await
    }

    pub async fn remove_from_playlist(&self, id: PlaylistId, track: &Track) -> Result<Playlist> {
        self.update_playlist(id, |playlist| {
            let before = playlist.tracks.len();
            playlist.tracks.retain(|t| !t.same_as(track));
            playlist.tracks.len() != before
        })
        .await
    }

    /// Apply `change` to one playlist; persists only when it reports a
    /// modification.
    async fn update_playlist<F>(&self, id: PlaylistId, change: F) -> Result<Playlist>
    where
        F: FnOnce(&mut Playlist) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut playlists: Vec<Playlist> = self.load_list(PLAYLISTS_KEY).await?;

        let playlist = playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| playlist_not_found(id))?;

        if !change(playlist) {
            return Ok(playlist.clone());
        }
        playlist.updated_at = self.clock.now().max(playlist.created_at);
        let updated = playlist.clone();

        self.save_list(PLAYLISTS_KEY, &playlists).await?;
        self.emit(LibraryEvent::PlaylistUpdated {
            playlist_id: id.to_string(),
            track_count: updated.tracks.len(),
        });
        Ok(updated)
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::InvalidInput {
            field: "name".to_string(),
            message: "Playlist name cannot be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn playlist_not_found(id: PlaylistId) -> LibraryError {
    LibraryError::NotFound {
        entity_type: "Playlist".to_string(),
        id: id.to_string(),
    }
}
