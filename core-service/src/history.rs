//! Play-history recorder.
//!
//! Listens for `Started` on the event bus and records the started track. The
//! track itself is read from the player's snapshot; a start that is already
//! superseded by the time it is seen is not recorded.

use std::sync::Arc;

use core_async::sync::broadcast::{self, error::RecvError};
use core_async::sync::watch;
use core_async::task::JoinHandle;
use core_library::LibraryService;
use core_playback::SessionSnapshot;
use core_runtime::events::{CoreEvent, PlaybackEvent};
use tracing::{debug, warn};

pub(crate) fn spawn_recorder(
    mut events: broadcast::Receiver<CoreEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
    library: Arc<LibraryService>,
) -> JoinHandle<()> {
    core_async::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CoreEvent::Playback(PlaybackEvent::Started { track_id, source, .. })) => {
                    let track = snapshots
                        .borrow()
                        .current_track
                        .clone()
                        .filter(|t| t.id == track_id && t.source.to_string() == source);

                    match track {
                        Some(track) => {
                            if let Err(e) = library.record_play(&track).await {
                                warn!(%track_id, error = %e, "Failed to record play history");
                            }
                        }
                        None => debug!(%track_id, "Started track no longer current, not recorded"),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "History recorder fell behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
