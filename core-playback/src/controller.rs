//! # Playback Controller
//!
//! Owns the single "now playing" session and drives it through
//!
//! ```text
//!            play_track / next / previous
//!   Idle ──────────────────────────────▶ Resolving ──▶ Playing ◀──▶ Paused
//!    ▲                                      │             │
//!    │ queue exhausted / clear_player       │ failure     │ completion
//!    │                                      ▼             ▼
//!    └──────────────── Failed ◀──── (skip policy)    Transitioning ──▶ Resolving
//! ```
//!
//! ## Ordering
//!
//! Every navigation intent bumps a generation counter under the state lock
//! and commits "now playing" immediately, so observers see the new track
//! before audio is ready. Teardown and creation of sink handles run under a
//! single async navigation lock; resolution runs outside it. Work started for an older
//! generation is discarded when it completes: a freshly created sink is
//! unloaded on the spot. Together these keep at most one live sink handle
//! at any instant.
//!
//! Status callbacks from the sink, auto-skip timers and completion handling
//! all arrive as messages tagged with the generation they belong to, and are
//! dropped when that generation is no longer current.

use std::sync::{Arc, Weak};

use bridge_traits::error::BridgeError;
use bridge_traits::playback::{AudioSink, LoadOptions, SinkHandle, SinkStatus};
use core_async::sync::{mpsc, watch, Mutex as AsyncMutex, OnceCell};
use core_async::task::JoinHandle;
use core_async::time::sleep;
use core_library::Track;
use core_runtime::events::{EventBus, PlaybackEvent, StopReason};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::queue::{step_back, step_forward, Queue, RepeatMode};
use crate::resolver::{ResolvedStream, StreamOrigin, StreamResolver};
use crate::session::{release_handle, PlaybackSession};
use crate::skip_policy::{FailedTracks, FailureSkipPolicy};

// ============================================================================
// Public types
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No track loaded.
    #[default]
    Idle,
    /// Stream URL lookup in flight.
    Resolving,
    Playing,
    Paused,
    /// Old session being released while the next track is prepared.
    Transitioning,
    /// The current track failed; an auto-skip or stop is pending.
    Failed,
}

impl PlaybackPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackPhase::Idle => "idle",
            PlaybackPhase::Resolving => "resolving",
            PlaybackPhase::Playing => "playing",
            PlaybackPhase::Paused => "paused",
            PlaybackPhase::Transitioning => "transitioning",
            PlaybackPhase::Failed => "failed",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PlaybackPhase::Resolving | PlaybackPhase::Transitioning)
    }
}

/// Read-only view of the controller, published on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub current_track: Option<Track>,
    pub queue: Queue,
    pub index: Option<usize>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub repeat_mode: RepeatMode,
    pub is_shuffled: bool,
    pub phase: PlaybackPhase,
    /// Message of the failure shown for the current track.
    pub error: Option<String>,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub is_buffering: bool,
}

/// How a navigation request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Playing { index: usize },
    /// The target failed; `skip_to` is the index the policy will move to.
    Failed { index: usize, skip_to: Option<usize> },
    Stopped(StopReason),
    /// A later request took over before this one completed.
    Superseded,
}

// ============================================================================
// Internal state
// ============================================================================

#[derive(Default)]
struct PlayerState {
    generation: u64,
    phase: PlaybackPhase,
    queue: Queue,
    index: Option<usize>,
    current: Option<Track>,
    /// Pre-shuffle order, present while shuffle is on.
    original_queue: Option<Queue>,
    repeat: RepeatMode,
    session: Option<PlaybackSession>,
    failed: FailedTracks,
    is_playing: bool,
    is_buffering: bool,
    position_ms: u64,
    duration_ms: Option<u64>,
    error: Option<String>,
}

impl PlayerState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_track: self.current.clone(),
            queue: self.queue.clone(),
            index: self.index,
            is_playing: self.is_playing,
            is_loading: self.phase.is_loading(),
            repeat_mode: self.repeat,
            is_shuffled: self.original_queue.is_some(),
            phase: self.phase,
            error: self.error.clone(),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            is_buffering: self.is_buffering,
        }
    }

    fn current_id(&self) -> Option<String> {
        self.current.as_ref().map(|t| t.id.clone())
    }
}

enum Target {
    Play { queue: Queue, index: usize },
    Index(usize),
    Next,
    Previous,
    Reload,
}

#[derive(Debug, Clone, Copy)]
enum Cause {
    /// `play_track`: resets failures and shuffle.
    Fresh,
    User,
    /// Timer or completion driven; only applies if `expected` is still
    /// current.
    Auto { expected: u64 },
}

enum Begin {
    Load {
        generation: u64,
        track: Track,
        index: usize,
    },
    Stop {
        generation: u64,
    },
    Superseded,
}

enum Opened {
    Done(TransitionOutcome),
    Rejected(BridgeError),
}

enum Message {
    Status { generation: u64, status: SinkStatus },
    AutoSkip { generation: u64, target: Track },
    Exhausted { generation: u64 },
}

struct Inner {
    sink: Arc<dyn AudioSink>,
    resolver: Arc<StreamResolver>,
    config: PlayerConfig,
    policy: FailureSkipPolicy,
    events: Option<EventBus>,
    state: Mutex<PlayerState>,
    nav_lock: AsyncMutex<()>,
    sink_ready: OnceCell<()>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    messages: mpsc::UnboundedSender<Message>,
}

// ============================================================================
// PlaybackController
// ============================================================================

pub struct PlaybackController {
    inner: Arc<Inner>,
    pump: JoinHandle<()>,
}

impl PlaybackController {
    /// Create a controller. Must be called from within a Tokio runtime: it
    /// spawns the task that consumes sink status updates.
    pub fn new(
        sink: Arc<dyn AudioSink>,
        resolver: Arc<StreamResolver>,
        config: PlayerConfig,
        events: Option<EventBus>,
    ) -> Self {
        let (messages, receiver) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());

        let inner = Arc::new(Inner {
            sink,
            resolver,
            policy: FailureSkipPolicy::from_config(&config),
            config,
            events,
            state: Mutex::new(PlayerState::default()),
            nav_lock: AsyncMutex::new(()),
            sink_ready: OnceCell::new(),
            snapshot_tx,
            messages,
        });

        let pump = core_async::spawn(run_pump(Arc::downgrade(&inner), receiver));
        Self { inner, pump }
    }

    pub fn resolver(&self) -> &Arc<StreamResolver> {
        &self.inner.resolver
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.inner.state.lock().repeat
    }

    pub fn is_shuffled(&self) -> bool {
        self.inner.state.lock().original_queue.is_some()
    }

    /// Play `track`, making `queue` (or just the track) the new queue.
    ///
    /// When `index` is omitted the track's position in `queue` is used. The
    /// queue entry at `index` must be `track`.
    ///
    /// # Errors
    ///
    /// Only for malformed input. Resolution and sink failures are reported
    /// through [`TransitionOutcome::Failed`] and the session snapshot.
    #[instrument(skip_all, fields(track_id = %track.id, source = %track.source))]
    pub async fn play_track(
        &self,
        track: Track,
        queue: Option<Vec<Track>>,
        index: Option<usize>,
    ) -> Result<TransitionOutcome> {
        track.validate().map_err(PlaybackError::InvalidTrack)?;

        let mut tracks = match queue {
            Some(queue) if !queue.is_empty() => queue,
            _ => vec![track.clone()],
        };

        let index = match index {
            Some(index) => index,
            None => tracks.iter().position(|t| t.same_as(&track)).ok_or_else(|| {
                PlaybackError::InvalidQueue(format!("track '{}' is not in the queue", track.id))
            })?,
        };

        match tracks.get(index) {
            Some(entry) if entry.same_as(&track) => {}
            Some(_) => {
                return Err(PlaybackError::InvalidQueue(format!(
                    "track '{}' is not at index {}",
                    track.id, index
                )))
            }
            None => {
                return Err(PlaybackError::InvalidQueue(format!(
                    "index {} out of range for {} tracks",
                    index,
                    tracks.len()
                )))
            }
        }
        // The caller's copy may carry a pre-resolved URL the queue entry lacks.
        tracks[index] = track;

        Ok(self
            .inner
            .navigate(
                Target::Play {
                    queue: Queue::new(tracks),
                    index,
                },
                Cause::Fresh,
            )
            .await)
    }

    #[instrument(skip(self))]
    pub async fn next_track(&self) -> TransitionOutcome {
        self.inner.navigate(Target::Next, Cause::User).await
    }

    #[instrument(skip(self))]
    pub async fn previous_track(&self) -> TransitionOutcome {
        self.inner.navigate(Target::Previous, Cause::User).await
    }

    /// Toggle between playing and paused without touching the session.
    ///
    /// From `Idle` with a retained current track (after the queue ran out)
    /// the track is loaded again. Ignored while a transition is in flight.
    #[instrument(skip(self))]
    pub async fn play_pause(&self) -> Result<()> {
        let (phase, has_track) = {
            let state = self.inner.state.lock();
            (state.phase, state.current.is_some())
        };

        match phase {
            PlaybackPhase::Idle if has_track => {
                self.inner.navigate(Target::Reload, Cause::User).await;
                return Ok(());
            }
            PlaybackPhase::Playing | PlaybackPhase::Paused => {}
            _ => return Ok(()),
        }

        let _nav = self.inner.nav_lock.lock().await;
        let (handle, pause) = {
            let state = self.inner.state.lock();
            match (&state.session, state.phase) {
                (Some(session), PlaybackPhase::Playing) => (session.handle(), true),
                (Some(session), PlaybackPhase::Paused) => (session.handle(), false),
                _ => return Ok(()),
            }
        };

        if pause {
            handle.pause().await?;
        } else {
            handle.play().await?;
        }

        let (changed, track_id, position_ms) = self.inner.update(|state| {
            // The sink may already have reported the change through its status.
            let changed = state.is_playing == pause;
            state.phase = if pause {
                PlaybackPhase::Paused
            } else {
                PlaybackPhase::Playing
            };
            state.is_playing = !pause;
            (changed, state.current_id().unwrap_or_default(), state.position_ms)
        });

        if !changed {
            return Ok(());
        }
        self.inner.emit(if pause {
            PlaybackEvent::Paused {
                track_id,
                position_ms,
            }
        } else {
            PlaybackEvent::Resumed {
                track_id,
                position_ms,
            }
        });
        Ok(())
    }

    /// Seek the live sink. The target is clamped to `[0, duration]`.
    /// Returns the position actually applied.
    pub async fn seek_to(&self, position_ms: i64) -> Result<u64> {
        let _nav = self.inner.nav_lock.lock().await;
        let (handle, duration_ms) = {
            let state = self.inner.state.lock();
            match (&state.session, state.phase) {
                (Some(session), PlaybackPhase::Playing | PlaybackPhase::Paused) => (
                    session.handle(),
                    state.duration_ms.or_else(|| session.track().duration_ms()),
                ),
                _ => return Err(PlaybackError::NoTrackLoaded),
            }
        };

        let mut target = u64::try_from(position_ms).unwrap_or(0);
        if let Some(duration) = duration_ms {
            target = target.min(duration);
        }
        if i64::try_from(target).ok() != Some(position_ms) {
            debug!(requested = position_ms, applied = target, "Seek clamped");
        }

        handle.seek_to(target).await?;

        let (track_id, duration_ms) = self.inner.update(|state| {
            state.position_ms = target;
            (state.current_id().unwrap_or_default(), state.duration_ms)
        });
        self.inner.emit(PlaybackEvent::PositionChanged {
            track_id,
            position_ms: target,
            duration_ms,
        });
        Ok(target)
    }

    /// Toggle shuffle, returning the new state.
    ///
    /// Enabling pins the current track at the head of a shuffled copy of the
    /// queue. Disabling restores the original order and points the index at
    /// the current track's original position.
    /// With nothing queued this is a no-op returning `false`.
    pub fn toggle_shuffle(&self) -> bool {
        let toggled = self.inner.update(|state| match state.original_queue.take() {
            None if state.queue.is_empty() => None,
            Some(original) => {
                state.index = state
                    .current
                    .as_ref()
                    .filter(|_| !original.is_empty())
                    .map(|track| original.position_of(track).unwrap_or(0));
                state.queue = original;
                Some(false)
            }
            None => {
                let shuffled = state.queue.shuffled(state.index, &mut rand::thread_rng());
                state.original_queue = Some(std::mem::replace(&mut state.queue, shuffled));
                state.index = state.index.map(|_| 0);
                Some(true)
            }
        });
        let Some(enabled) = toggled else {
            debug!("Shuffle ignored, queue is empty");
            return false;
        };

        info!(enabled, "Shuffle toggled");
        self.inner.emit(PlaybackEvent::ShuffleChanged { enabled });
        self.inner.prefetch_following();
        enabled
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        self.inner.update(|state| state.repeat = mode);
        self.inner.emit(PlaybackEvent::RepeatModeChanged {
            mode: mode.as_str().to_string(),
        });
        self.inner.prefetch_following();
    }

    /// Tear down the session and forget the queue. Always succeeds.
    #[instrument(skip(self))]
    pub async fn clear_player(&self) {
        let (generation, previous) = self.inner.update(|state| {
            state.generation += 1;
            let previous = state.current.take();
            state.queue = Queue::default();
            state.index = None;
            state.original_queue = None;
            state.failed.clear();
            state.phase = PlaybackPhase::Idle;
            state.is_playing = false;
            state.is_buffering = false;
            state.position_ms = 0;
            state.duration_ms = None;
            state.error = None;
            (state.generation, previous)
        });

        let session = {
            let _nav = self.inner.nav_lock.lock().await;
            let session = {
                let mut state = self.inner.state.lock();
                match &state.session {
                    Some(session) if session.generation() < generation => state.session.take(),
                    _ => None,
                }
            };
            if let Some(session) = session {
                session.release().await;
                true
            } else {
                false
            }
        };

        if session || previous.is_some() {
            info!("Player cleared");
            self.inner.emit(PlaybackEvent::Stopped {
                track_id: previous.map(|t| t.id),
                reason: StopReason::Cleared,
            });
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

// ============================================================================
// Navigation
// ============================================================================

impl Inner {
    fn update<R>(&self, f: impl FnOnce(&mut PlayerState) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        self.snapshot_tx.send_replace(state.snapshot());
        result
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            events.publish_playback(event);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    /// Claim the next generation if `expected` is still current.
    fn advance_generation(&self, expected: u64) -> Option<u64> {
        let mut state = self.state.lock();
        if state.generation != expected {
            return None;
        }
        state.generation += 1;
        Some(state.generation)
    }

    async fn navigate(self: &Arc<Self>, target: Target, cause: Cause) -> TransitionOutcome {
        match self.begin(target, cause) {
            Begin::Superseded => TransitionOutcome::Superseded,
            Begin::Stop { generation } => {
                if self.stop(generation, StopReason::QueueExhausted).await {
                    TransitionOutcome::Stopped(StopReason::QueueExhausted)
                } else {
                    TransitionOutcome::Superseded
                }
            }
            Begin::Load {
                generation,
                track,
                index,
            } => self.load(generation, track, index).await,
        }
    }

    /// Record the navigation intent and commit "now playing".
    fn begin(&self, target: Target, cause: Cause) -> Begin {
        let mut state = self.state.lock();
        if let Cause::Auto { expected } = cause {
            if state.generation != expected {
                return Begin::Superseded;
            }
        }

        let len = state.queue.len();
        let repeat = state.repeat;
        let (queue, index) = match target {
            Target::Play { queue, index } => (queue, Some(index)),
            Target::Index(index) => (state.queue.clone(), Some(index)),
            Target::Next => (
                state.queue.clone(),
                state.index.and_then(|i| step_forward(i, len, repeat)),
            ),
            Target::Previous => (
                state.queue.clone(),
                state.index.and_then(|i| step_back(i, len, repeat)),
            ),
            Target::Reload => (state.queue.clone(), state.index),
        };

        state.generation += 1;
        let generation = state.generation;

        let Some((index, track)) = index.and_then(|i| queue.get(i).cloned().map(|t| (i, t))) else {
            return Begin::Stop { generation };
        };

        if matches!(cause, Cause::Fresh) {
            state.failed.clear();
            state.original_queue = None;
        }
        state.phase = if state.session.is_some() {
            PlaybackPhase::Transitioning
        } else {
            PlaybackPhase::Resolving
        };
        state.queue = queue;
        state.index = Some(index);
        state.current = Some(track.clone());
        state.is_playing = false;
        state.is_buffering = false;
        state.position_ms = 0;
        state.duration_ms = track.duration_ms();
        state.error = None;
        let queue_len = state.queue.len();
        self.snapshot_tx.send_replace(state.snapshot());
        drop(state);

        info!(generation, track_id = %track.id, source = %track.source, index, ?cause, "Now playing");
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.id.clone(),
            source: track.source.to_string(),
            title: track.title.clone(),
            index,
            queue_len,
        });

        Begin::Load {
            generation,
            track,
            index,
        }
    }

    /// Release the old session, then resolve and load `track`.
    ///
    /// The navigation lock covers teardown and sink creation only; resolution
    /// runs unlocked and its result is dropped if a newer intent arrived.
    async fn load(self: &Arc<Self>, generation: u64, track: Track, index: usize) -> TransitionOutcome {
        if !self.release_previous(generation).await {
            return TransitionOutcome::Superseded;
        }

        if let Err(e) = self.sink_ready.get_or_try_init(|| self.sink.setup()).await {
            let error = PlaybackError::SinkLoad(format!("audio sink setup failed: {}", e));
            return self.fail(generation, &track, index, error);
        }

        let mut stream = match &track.stream_url {
            Some(url) => ResolvedStream {
                url: url.clone(),
                origin: StreamOrigin::Provided,
            },
            None => match self.resolver.resolve_track(&track).await {
                Ok(stream) => stream,
                Err(e) => return self.fail(generation, &track, index, e.into()),
            },
        };

        let mut retries = 0;
        loop {
            match self.open_stream(generation, &track, index, &stream).await {
                Opened::Done(outcome) => return outcome,
                Opened::Rejected(e) if self.policy.should_retry(stream.origin, retries) => {
                    retries += 1;
                    warn!(generation, track_id = %track.id, error = %e, "Stream rejected, re-resolving");
                    stream = match self.resolver.refresh_track(&track).await {
                        Ok(stream) => stream,
                        Err(e) => return self.fail(generation, &track, index, e.into()),
                    };
                }
                Opened::Rejected(e) => {
                    return self.fail(generation, &track, index, PlaybackError::SinkLoad(e.to_string()))
                }
            }
        }
    }

    /// Tear down whatever session is live. Returns false when `generation`
    /// was superseded.
    async fn release_previous(&self, generation: u64) -> bool {
        let _nav = self.nav_lock.lock().await;

        let previous = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return false;
            }
            state.session.take()
        };
        if let Some(previous) = previous {
            previous.release().await;
        }

        self.update(|state| {
            let current = state.generation == generation;
            if current {
                state.phase = PlaybackPhase::Resolving;
            }
            current
        })
    }

    /// Create a sink for `stream` and install it as the session, all under
    /// the navigation lock.
    async fn open_stream(
        self: &Arc<Self>,
        generation: u64,
        track: &Track,
        index: usize,
        stream: &ResolvedStream,
    ) -> Opened {
        let _nav = self.nav_lock.lock().await;

        let leftover = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return Opened::Done(TransitionOutcome::Superseded);
            }
            state.session.take()
        };
        if let Some(leftover) = leftover {
            leftover.release().await;
        }

        debug!(
            generation,
            url = %redact_url(&stream.url),
            origin = ?stream.origin,
            "Loading stream"
        );
        match self.sink.create_and_load(&stream.url, LoadOptions::default()).await {
            Ok(handle) => {
                let handle: Arc<dyn SinkHandle> = Arc::from(handle);
                Opened::Done(self.install(generation, track.clone(), index, handle).await)
            }
            Err(e) if !self.is_current(generation) => {
                debug!(generation, error = %e, "Superseded load failed");
                Opened::Done(TransitionOutcome::Superseded)
            }
            Err(e) => Opened::Rejected(e),
        }
    }

    async fn install(
        self: &Arc<Self>,
        generation: u64,
        track: Track,
        index: usize,
        handle: Arc<dyn SinkHandle>,
    ) -> TransitionOutcome {
        let messages = self.messages.clone();
        let subscription = handle.on_status(Box::new(move |status| {
            let _ = messages.send(Message::Status { generation, status });
        }));

        let rejected = {
            let mut state = self.state.lock();
            if state.generation != generation {
                Some(subscription)
            } else {
                state.session = Some(PlaybackSession::new(
                    generation,
                    track.clone(),
                    Arc::clone(&handle),
                    subscription,
                ));
                state.phase = PlaybackPhase::Playing;
                state.is_playing = true;
                state.error = None;
                self.snapshot_tx.send_replace(state.snapshot());
                None
            }
        };

        if let Some(subscription) = rejected {
            subscription.unsubscribe();
            release_handle(handle.as_ref()).await;
            return TransitionOutcome::Superseded;
        }

        info!(generation, track_id = %track.id, sink = %handle.id(), "Playback started");
        self.emit(PlaybackEvent::Started {
            track_id: track.id.clone(),
            source: track.source.to_string(),
            title: track.title.clone(),
        });
        self.prefetch_following();

        TransitionOutcome::Playing { index }
    }

    /// Warm the cache for the entry after the current one.
    fn prefetch_following(&self) {
        if !self.config.prefetch_next {
            return;
        }

        let next = {
            let state = self.state.lock();
            let len = state.queue.len();
            let next_index = match state.index {
                Some(index) if index + 1 < len => Some(index + 1),
                Some(_) if state.repeat == RepeatMode::All && len > 1 => Some(0),
                _ => None,
            };
            next_index
                .and_then(|i| state.queue.get(i).cloned())
                .filter(|track| !state.failed.contains(track))
        };

        if let Some(track) = next {
            debug!(track_id = %track.id, "Prefetching next track");
            let _ = self.resolver.spawn_prefetch(&track);
        }
    }

    /// Apply the failure-skip policy to the current track.
    fn fail(&self, generation: u64, track: &Track, index: usize, error: PlaybackError) -> TransitionOutcome {
        let message = error.to_string();

        let decision = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return TransitionOutcome::Superseded;
            }
            state.failed.mark(track);
            state.phase = PlaybackPhase::Failed;
            state.is_playing = false;
            state.is_buffering = false;
            state.error = Some(message.clone());

            let failed_index = state.index.unwrap_or(index);
            let decision = self
                .policy
                .decide(&state.queue, failed_index, &state.failed, state.repeat);
            let target = decision
                .target()
                .and_then(|i| state.queue.get(i).cloned());
            self.snapshot_tx.send_replace(state.snapshot());
            (decision, target)
        };

        let (decision, target) = decision;
        warn!(
            generation,
            track_id = %track.id,
            error = %message,
            skip_to = ?decision.target(),
            "Track failed"
        );
        self.emit(PlaybackEvent::Error {
            track_id: Some(track.id.clone()),
            message,
            recoverable: target.is_some(),
        });

        let messages = self.messages.clone();
        let delay = decision.delay();
        core_async::spawn(async move {
            sleep(delay).await;
            let message = match target {
                Some(target) => Message::AutoSkip { generation, target },
                None => Message::Exhausted { generation },
            };
            let _ = messages.send(message);
        });

        TransitionOutcome::Failed {
            index,
            skip_to: decision.target(),
        }
    }

    /// The live sink reported a failure after loading.
    async fn fail_current(self: Arc<Self>, generation: u64, message: String) {
        let _nav = self.nav_lock.lock().await;
        let (session, track, index) = {
            let mut state = self.state.lock();
            // Only the first report for a live session counts.
            let live = state.generation == generation
                && state
                    .session
                    .as_ref()
                    .is_some_and(|session| session.generation() == generation);
            if !live {
                debug!(generation, error = %message, "Sink failure already handled");
                return;
            }
            let Some(track) = state.current.clone() else {
                return;
            };
            (state.session.take(), track, state.index.unwrap_or(0))
        };

        if let Some(session) = session {
            session.release().await;
        }
        self.fail(generation, &track, index, PlaybackError::SinkFailure(message));
    }

    /// Go idle. Returns false when `generation` was superseded.
    async fn stop(&self, generation: u64, reason: StopReason) -> bool {
        let _nav = self.nav_lock.lock().await;
        let (session, stopped_track) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return false;
            }
            let was_active = state.session.is_some() || state.phase != PlaybackPhase::Idle;
            let session = state.session.take();
            state.phase = PlaybackPhase::Idle;
            state.is_playing = false;
            state.is_buffering = false;
            state.error = match reason {
                StopReason::NoPlayableTracks => Some("No playable tracks".to_string()),
                _ => None,
            };
            self.snapshot_tx.send_replace(state.snapshot());
            (session, was_active.then(|| state.current_id()))
        };

        if let Some(session) = session {
            session.release().await;
        }
        if let Some(track_id) = stopped_track {
            info!(generation, reason = reason.as_str(), "Playback stopped");
            self.emit(PlaybackEvent::Stopped { track_id, reason });
        }
        true
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    fn handle(self: &Arc<Self>, message: Message) {
        match message {
            Message::Status { generation, status } => self.on_status(generation, status),
            Message::AutoSkip { generation, target } => self.on_auto_skip(generation, target),
            Message::Exhausted { generation } => {
                let inner = Arc::clone(self);
                core_async::spawn(async move {
                    if let Some(generation) = inner.advance_generation(generation) {
                        inner.stop(generation, StopReason::NoPlayableTracks).await;
                    }
                });
            }
        }
    }

    fn on_status(self: &Arc<Self>, generation: u64, status: SinkStatus) {
        enum Followup {
            Nothing,
            Completed(String),
            Failed(String),
            PlayState {
                playing: bool,
                track_id: String,
                position_ms: u64,
            },
        }

        let followup = {
            let mut state = self.state.lock();
            let live = state.generation == generation
                && state
                    .session
                    .as_ref()
                    .is_some_and(|session| session.generation() == generation);
            if !live {
                return;
            }

            state.position_ms = status.position_ms;
            if status.duration_ms.is_some() {
                state.duration_ms = status.duration_ms;
            }
            state.is_buffering = status.is_buffering;

            let followup = if let Some(error) = status.error {
                Followup::Failed(error)
            } else if status.did_just_finish {
                state.is_playing = false;
                Followup::Completed(state.current_id().unwrap_or_default())
            } else if status.is_loaded
                && !status.is_buffering
                && status.is_playing != state.is_playing
                && matches!(state.phase, PlaybackPhase::Playing | PlaybackPhase::Paused)
            {
                // The sink paused or resumed on its own (e.g. an OS interruption).
                state.is_playing = status.is_playing;
                state.phase = if status.is_playing {
                    PlaybackPhase::Playing
                } else {
                    PlaybackPhase::Paused
                };
                Followup::PlayState {
                    playing: status.is_playing,
                    track_id: state.current_id().unwrap_or_default(),
                    position_ms: status.position_ms,
                }
            } else {
                Followup::Nothing
            };
            self.snapshot_tx.send_replace(state.snapshot());
            followup
        };

        match followup {
            Followup::Nothing => {}
            Followup::Completed(track_id) => {
                debug!(generation, %track_id, "Track completed");
                self.emit(PlaybackEvent::Completed { track_id });
                let inner = Arc::clone(self);
                core_async::spawn(async move {
                    let outcome = inner
                        .navigate(Target::Next, Cause::Auto { expected: generation })
                        .await;
                    debug!(?outcome, "Auto-advance finished");
                });
            }
            Followup::Failed(message) => {
                core_async::spawn(Arc::clone(self).fail_current(generation, message));
            }
            Followup::PlayState {
                playing,
                track_id,
                position_ms,
            } => {
                debug!(generation, %track_id, playing, "Sink changed play state");
                self.emit(if playing {
                    PlaybackEvent::Resumed {
                        track_id,
                        position_ms,
                    }
                } else {
                    PlaybackEvent::Paused {
                        track_id,
                        position_ms,
                    }
                });
            }
        }
    }

    fn on_auto_skip(self: &Arc<Self>, generation: u64, target: Track) {
        let skip = {
            let state = self.state.lock();
            if state.generation != generation {
                return;
            }
            // The queue may have been reshuffled while the error was shown.
            let index = state.queue.position_of(&target).or_else(|| {
                let failed_index = state.index?;
                self.policy
                    .decide(&state.queue, failed_index, &state.failed, state.repeat)
                    .target()
            });
            index.map(|index| (index, state.current_id().unwrap_or_default()))
        };

        let Some((index, failed_track_id)) = skip else {
            return;
        };
        info!(generation, %failed_track_id, next_track_id = %target.id, "Skipping failed track");
        self.emit(PlaybackEvent::Skipped {
            failed_track_id,
            next_track_id: target.id.clone(),
        });

        let inner = Arc::clone(self);
        core_async::spawn(async move {
            inner
                .navigate(Target::Index(index), Cause::Auto { expected: generation })
                .await;
        });
    }
}

async fn run_pump(inner: Weak<Inner>, mut messages: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = messages.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle(message);
    }
}
