//! Shared fakes for the controller integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    AudioSink, LoadOptions, SinkHandle, SinkId, SinkStatus, StatusCallback, StatusSubscription,
};
use core_library::{SourceKind, Track};
use core_playback::{
    PlaybackController, PlayerConfig, ResolutionError, ResolveHint, ResolverConfig,
    SourceRegistry, SourceStrategy, StreamResolver,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use tokio::sync::broadcast;

// ============================================================================
// Fake sink
// ============================================================================

#[derive(Default)]
struct SinkShared {
    live: AtomicUsize,
    max_live: AtomicUsize,
    setups: AtomicUsize,
    loads: Mutex<Vec<String>>,
    rejected_fragments: Mutex<Vec<String>>,
    load_delay: Mutex<Duration>,
    handles: Mutex<Vec<Arc<HandleShared>>>,
}

struct HandleShared {
    url: String,
    unloaded: AtomicBool,
    callback: Mutex<Option<StatusCallback>>,
    commands: Mutex<Vec<String>>,
}

/// Records every load and tracks how many handles are alive at once.
#[derive(Clone, Default)]
pub struct FakeSink {
    shared: Arc<SinkShared>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any URL containing `fragment`.
    pub fn reject_urls_containing(&self, fragment: &str) {
        self.shared.rejected_fragments.lock().push(fragment.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.shared.load_delay.lock() = delay;
    }

    pub fn loads(&self) -> Vec<String> {
        self.shared.loads.lock().clone()
    }

    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }

    pub fn setups(&self) -> usize {
        self.shared.setups.load(Ordering::SeqCst)
    }

    fn current(&self) -> Option<Arc<HandleShared>> {
        self.shared
            .handles
            .lock()
            .iter()
            .rev()
            .find(|h| !h.unloaded.load(Ordering::SeqCst))
            .cloned()
    }

    /// URL of the live handle.
    pub fn current_url(&self) -> Option<String> {
        self.current().map(|h| h.url.clone())
    }

    /// Commands received by the live handle.
    pub fn current_commands(&self) -> Vec<String> {
        self.current()
            .map(|h| h.commands.lock().clone())
            .unwrap_or_default()
    }

    /// Push `status` through the live handle's subscription.
    pub fn emit(&self, status: SinkStatus) {
        if let Some(handle) = self.current() {
            if let Some(callback) = handle.callback.lock().as_ref() {
                callback(status);
            }
        }
    }

    pub fn finish_current(&self) {
        self.emit(SinkStatus {
            is_loaded: true,
            did_just_finish: true,
            ..Default::default()
        });
    }

    pub fn fail_current(&self, message: &str) {
        self.emit(SinkStatus {
            is_loaded: true,
            error: Some(message.to_string()),
            ..Default::default()
        });
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn setup(&self) -> BridgeResult<()> {
        self.shared.setups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_and_load(&self, url: &str, _options: LoadOptions) -> BridgeResult<Box<dyn SinkHandle>> {
        self.shared.loads.lock().push(url.to_string());

        let delay = *self.shared.load_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let rejected = self
            .shared
            .rejected_fragments
            .lock()
            .iter()
            .any(|fragment| url.contains(fragment.as_str()));
        if rejected {
            return Err(BridgeError::MediaRejected(format!("HTTP 403 for {url}")));
        }

        let live = self.shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_live.fetch_max(live, Ordering::SeqCst);

        let handle = Arc::new(HandleShared {
            url: url.to_string(),
            unloaded: AtomicBool::new(false),
            callback: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
        });
        self.shared.handles.lock().push(Arc::clone(&handle));

        Ok(Box::new(FakeHandle {
            id: SinkId::new(),
            sink: Arc::clone(&self.shared),
            handle,
        }))
    }
}

struct FakeHandle {
    id: SinkId,
    sink: Arc<SinkShared>,
    handle: Arc<HandleShared>,
}

impl FakeHandle {
    fn record(&self, command: impl Into<String>) {
        self.handle.commands.lock().push(command.into());
    }
}

#[async_trait]
impl SinkHandle for FakeHandle {
    fn id(&self) -> SinkId {
        self.id
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop");
        Ok(())
    }

    async fn unload(&self) -> BridgeResult<()> {
        if !self.handle.unloaded.swap(true, Ordering::SeqCst) {
            self.sink.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn seek_to(&self, position_ms: u64) -> BridgeResult<()> {
        self.record(format!("seek:{position_ms}"));
        Ok(())
    }

    fn on_status(&self, callback: StatusCallback) -> StatusSubscription {
        *self.handle.callback.lock() = Some(callback);
        let handle = Arc::clone(&self.handle);
        StatusSubscription::new(move || {
            handle.callback.lock().take();
        })
    }
}

// ============================================================================
// Fake resolution strategy
// ============================================================================

/// Resolves every id to `https://cdn.test/{id}.mp3` unless told to fail.
pub struct StaticStrategy {
    kind: SourceKind,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    delays: Mutex<HashMap<String, Duration>>,
    urls: Mutex<HashMap<String, String>>,
}

impl StaticStrategy {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            urls: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    /// Make resolution of `id` take `delay`.
    pub fn set_delay(&self, id: &str, delay: Duration) {
        self.delays.lock().insert(id.to_string(), delay);
    }

    /// Resolve `id` to `url` from now on.
    pub fn set_url(&self, id: &str, url: &str) {
        self.urls.lock().insert(id.to_string(), url.to_string());
    }

    pub fn calls(&self, id: &str) -> usize {
        self.calls.lock().get(id).copied().unwrap_or(0)
    }
}

pub fn stream_url(id: &str) -> String {
    format!("https://cdn.test/{id}.mp3")
}

#[async_trait]
impl SourceStrategy for StaticStrategy {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn resolve(&self, id: &str, _hint: Option<&ResolveHint>) -> Result<String, ResolutionError> {
        *self.calls.lock().entry(id.to_string()).or_default() += 1;
        let delay = self.delays.lock().get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(id) {
            return Err(ResolutionError::Empty {
                backend: self.kind,
                id: id.to_string(),
            });
        }
        let url = self.urls.lock().get(id).cloned();
        Ok(url.unwrap_or_else(|| stream_url(id)))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub controller: PlaybackController,
    pub sink: FakeSink,
    pub strategy: Arc<StaticStrategy>,
    pub events: broadcast::Receiver<CoreEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlayerConfig {
            prefetch_next: false,
            ..PlayerConfig::default()
        })
    }

    pub fn with_config(config: PlayerConfig) -> Self {
        let sink = FakeSink::new();
        let strategy = Arc::new(StaticStrategy::new(SourceKind::VideoHost));
        let registry = SourceRegistry::new().with_strategy(strategy.clone());
        let resolver = Arc::new(StreamResolver::new(registry, ResolverConfig::default()));
        let bus = EventBus::new(256);
        let events = bus.subscribe();

        let controller = PlaybackController::new(Arc::new(sink.clone()), resolver, config, Some(bus));

        Self {
            controller,
            sink,
            strategy,
            events,
        }
    }

    /// Drain the playback events published so far.
    pub fn playback_events(&mut self) -> Vec<PlaybackEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let CoreEvent::Playback(event) = event {
                out.push(event);
            }
        }
        out
    }
}

pub fn tracks(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| Track::new(format!("t{i}"), format!("Track {i}"), SourceKind::VideoHost).with_duration_secs(180))
        .collect()
}

/// Let spawned tasks and timers run. Requires a paused clock.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
