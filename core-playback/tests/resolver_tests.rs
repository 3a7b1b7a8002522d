use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_library::{SourceKind, Track};
use core_playback::{
    AudioHostStrategy, CatalogStrategy, ResolutionError, ResolveHint, ResolverConfig,
    SourceRegistry, SourceStrategy, StreamOrigin, StreamResolver, VideoHostStrategy,
};
use mockall::mock;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
    }
}

fn json(status: u16, body: &str) -> Result<HttpResponse> {
    Ok(HttpResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from(body.to_string()),
    })
}

const TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Video host
// ============================================================================

#[tokio::test]
async fn test_video_host_picks_highest_bitrate_audio() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| req.url == "https://pipe.one/streams/abc123")
        .times(1)
        .returning(|_| {
            json(
                200,
                r#"{"audioStreams":[
                    {"url":"https://media/low","mimeType":"audio/webm","bitrate":64000},
                    {"url":"https://media/high","mimeType":"audio/mp4","bitrate":160000},
                    {"url":"https://media/video","mimeType":"video/mp4","bitrate":900000,"videoOnly":true}
                ]}"#,
            )
        });

    let strategy = VideoHostStrategy::new(Arc::new(http), vec!["https://pipe.one/".into()], TIMEOUT);
    let url = strategy.resolve("abc123", None).await.unwrap();
    assert_eq!(url, "https://media/high");
}

#[tokio::test]
async fn test_video_host_falls_back_across_instances() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| req.url.starts_with("https://down.example"))
        .times(1)
        .returning(|_| Err(BridgeError::OperationFailed("connection refused".into())));
    http.expect_execute()
        .withf(|req| req.url.starts_with("https://up.example"))
        .times(1)
        .returning(|_| {
            json(
                200,
                r#"{"audioStreams":[{"url":"https://media/ok","mimeType":"audio/webm","bitrate":128000}]}"#,
            )
        });

    let strategy = VideoHostStrategy::new(
        Arc::new(http),
        vec!["https://down.example".into(), "https://up.example".into()],
        TIMEOUT,
    );
    assert_eq!(strategy.resolve("v1", None).await.unwrap(), "https://media/ok");
}

#[tokio::test]
async fn test_video_host_without_audio_streams_is_empty() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .times(2)
        .returning(|_| json(200, r#"{"audioStreams":[]}"#));

    let strategy = VideoHostStrategy::new(
        Arc::new(http),
        vec!["https://a.example".into(), "https://b.example".into()],
        TIMEOUT,
    );
    let err = strategy.resolve("v1", None).await.unwrap_err();
    assert!(matches!(err, ResolutionError::Empty { .. }));
}

#[tokio::test]
async fn test_video_host_reports_last_transport_error() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .times(1)
        .returning(|_| json(503, "unavailable"));

    let strategy = VideoHostStrategy::new(Arc::new(http), vec!["https://a.example".into()], TIMEOUT);
    let err = strategy.resolve("v1", None).await.unwrap_err();
    assert!(matches!(err, ResolutionError::Backend { .. }));
}

/// First instance never answers before its request timeout; second answers
/// after a short delay.
struct HungFirstInstance;

#[async_trait]
impl HttpClient for HungFirstInstance {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if request.url.starts_with("https://hung.example") {
            let timeout = request.timeout.unwrap_or(Duration::from_secs(3600));
            tokio::time::sleep(timeout).await;
            return Err(BridgeError::Timeout(timeout));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        json(
            200,
            r#"{"audioStreams":[{"url":"https://media/fallback","mimeType":"audio/webm","bitrate":128000}]}"#,
        )
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_instance_leaves_budget_for_fallback() {
    let config = ResolverConfig::default();
    let strategy = VideoHostStrategy::new(
        Arc::new(HungFirstInstance),
        vec!["https://hung.example".into(), "https://up.example".into()],
        config.resolve_timeout,
    );
    let resolver = StreamResolver::new(SourceRegistry::new().with_strategy(Arc::new(strategy)), config);

    let resolved = resolver.resolve("v1", SourceKind::VideoHost, None).await.unwrap();
    assert_eq!(resolved.url, "https://media/fallback");
    assert_eq!(resolved.origin, StreamOrigin::Backend);
}

// ============================================================================
// Audio host
// ============================================================================

#[tokio::test]
async fn test_audio_host_numeric_id_skips_search() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| req.url == "https://api.audio.test/tracks/42/streams?client_id=cid")
        .times(1)
        .returning(|_| {
            json(
                200,
                r#"{"hls_mp3_128_url":"https://hls/mp3","http_mp3_128_url":"https://progressive/mp3"}"#,
            )
        });

    let strategy = AudioHostStrategy::new(Arc::new(http), "https://api.audio.test", "cid", TIMEOUT);
    let hint = ResolveHint::new("Song", Some("Artist".into()));
    let url = strategy.resolve("42", Some(&hint)).await.unwrap();
    assert_eq!(url, "https://progressive/mp3");
}

#[tokio::test]
async fn test_audio_host_disambiguates_by_search() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| {
            req.url.starts_with("https://api.audio.test/search/tracks?client_id=cid")
                && req.url.contains("q=Song%20Artist")
        })
        .times(1)
        .returning(|_| json(200, r#"{"collection":[{"id":777}]}"#));
    http.expect_execute()
        .withf(|req| req.url.starts_with("https://api.audio.test/tracks/777/streams"))
        .times(1)
        .returning(|_| json(200, r#"{"hls_opus_64_url":"https://hls/opus"}"#));

    let strategy = AudioHostStrategy::new(Arc::new(http), "https://api.audio.test", "cid", TIMEOUT);
    let hint = ResolveHint::new("Song", Some("Artist".into()));
    let url = strategy.resolve("song-slug", Some(&hint)).await.unwrap();
    assert_eq!(url, "https://hls/opus");
}

#[tokio::test]
async fn test_audio_host_no_variants_is_empty() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(1).returning(|_| json(200, "{}"));

    let strategy = AudioHostStrategy::new(Arc::new(http), "https://api.audio.test", "cid", TIMEOUT);
    let err = strategy.resolve("42", None).await.unwrap_err();
    assert!(matches!(err, ResolutionError::Empty { .. }));
}

// ============================================================================
// Catalog aggregator
// ============================================================================

#[tokio::test]
async fn test_catalog_prefers_configured_tier() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| req.url == "https://catalog.test/api/songs/s1")
        .times(1)
        .returning(|_| {
            json(
                200,
                r#"{"data":[{"downloadUrl":[
                    {"quality":"96kbps","url":"https://cdn/96"},
                    {"quality":"160kbps","url":"https://cdn/160"},
                    {"quality":"320kbps","url":"https://cdn/320"}
                ]}]}"#,
            )
        });

    let strategy = CatalogStrategy::new(
        Arc::new(http),
        "https://catalog.test",
        ResolverConfig::default().catalog_quality_preference,
        TIMEOUT,
    );
    assert_eq!(strategy.resolve("s1", None).await.unwrap(), "https://cdn/320");
}

#[tokio::test]
async fn test_catalog_searches_when_lookup_is_empty() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| req.url.starts_with("https://catalog.test/api/songs/"))
        .times(1)
        .returning(|_| json(404, ""));
    http.expect_execute()
        .withf(|req| req.url.starts_with("https://catalog.test/api/search/songs?query="))
        .times(1)
        .returning(|_| {
            json(
                200,
                r#"{"data":{"results":[{"downloadUrl":[{"quality":"160kbps","url":"https://cdn/found"}]}]}}"#,
            )
        });

    let strategy = CatalogStrategy::new(
        Arc::new(http),
        "https://catalog.test",
        ResolverConfig::default().catalog_quality_preference,
        TIMEOUT,
    );
    let hint = ResolveHint::new("Tum Hi Ho", None);
    assert_eq!(
        strategy.resolve("stale-id", Some(&hint)).await.unwrap(),
        "https://cdn/found"
    );
}

#[tokio::test]
async fn test_catalog_malformed_payload_is_backend_error() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .times(1)
        .returning(|_| json(200, "<html>oops</html>"));

    let strategy = CatalogStrategy::new(Arc::new(http), "https://catalog.test", vec![], TIMEOUT);
    let err = strategy.resolve("s1", None).await.unwrap_err();
    assert!(matches!(err, ResolutionError::Backend { .. }));
}

// ============================================================================
// Resolver
// ============================================================================

struct CountingStrategy {
    kind: SourceKind,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingStrategy {
    fn new(kind: SourceKind, delay: Duration) -> Self {
        Self {
            kind,
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceStrategy for CountingStrategy {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn resolve(&self, id: &str, _hint: Option<&ResolveHint>) -> std::result::Result<String, ResolutionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("https://cdn.test/{id}?v={n}"))
    }
}

fn resolver_with(strategy: Arc<CountingStrategy>, config: ResolverConfig) -> Arc<StreamResolver> {
    Arc::new(StreamResolver::new(
        SourceRegistry::new().with_strategy(strategy),
        config,
    ))
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_then_resolve_hits_cache() {
    let strategy = Arc::new(CountingStrategy::new(SourceKind::VideoHost, Duration::ZERO));
    let resolver = resolver_with(strategy.clone(), ResolverConfig::default());
    let track = Track::new("v1", "Song", SourceKind::VideoHost);

    assert!(resolver.spawn_prefetch(&track).await.unwrap());
    let resolved = resolver.resolve_track(&track).await.unwrap();

    assert_eq!(resolved.origin, StreamOrigin::Cache);
    assert_eq!(resolved.url, "https://cdn.test/v1?v=1");
    assert_eq!(strategy.calls(), 1);
    assert_eq!(resolver.cache().stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_resolved_again() {
    let strategy = Arc::new(CountingStrategy::new(SourceKind::VideoHost, Duration::ZERO));
    let config = ResolverConfig {
        cache_ttl: Duration::from_secs(60),
        ..ResolverConfig::default()
    };
    let resolver = resolver_with(strategy.clone(), config);

    let first = resolver.resolve("v1", SourceKind::VideoHost, None).await.unwrap();
    assert_eq!(first.origin, StreamOrigin::Backend);

    tokio::time::advance(Duration::from_secs(61)).await;

    let second = resolver.resolve("v1", SourceKind::VideoHost, None).await.unwrap();
    assert_eq!(second.origin, StreamOrigin::Backend);
    assert_eq!(second.url, "https://cdn.test/v1?v=2");
    assert_eq!(strategy.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out() {
    let strategy = Arc::new(CountingStrategy::new(SourceKind::AudioHost, Duration::from_secs(30)));
    let config = ResolverConfig {
        resolve_timeout: Duration::from_secs(10),
        ..ResolverConfig::default()
    };
    let resolver = resolver_with(strategy, config);

    let err = resolver
        .resolve("1", SourceKind::AudioHost, None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ResolutionError::Timeout {
            backend: SourceKind::AudioHost,
            timeout: Duration::from_secs(10)
        }
    );
    assert!(!resolver.cache().contains_fresh(SourceKind::AudioHost, "1"));
}

#[tokio::test]
async fn test_unregistered_source_is_unsupported() {
    let strategy = Arc::new(CountingStrategy::new(SourceKind::VideoHost, Duration::ZERO));
    let resolver = resolver_with(strategy, ResolverConfig::default());

    let err = resolver
        .resolve("x", SourceKind::CatalogAggregator, None)
        .await
        .unwrap_err();
    assert_eq!(err, ResolutionError::UnsupportedSource(SourceKind::CatalogAggregator));

    assert!(!resolver.prefetch("x", SourceKind::CatalogAggregator, None).await);
}

#[tokio::test]
async fn test_refresh_bypasses_cache() {
    let strategy = Arc::new(CountingStrategy::new(SourceKind::VideoHost, Duration::ZERO));
    let resolver = resolver_with(strategy.clone(), ResolverConfig::default());
    let track = Track::new("v1", "Song", SourceKind::VideoHost);

    resolver.resolve_track(&track).await.unwrap();
    let refreshed = resolver.refresh_track(&track).await.unwrap();

    assert_eq!(refreshed.origin, StreamOrigin::Backend);
    assert_eq!(refreshed.url, "https://cdn.test/v1?v=2");
    assert_eq!(
        resolver.resolve_track(&track).await.unwrap().url,
        "https://cdn.test/v1?v=2"
    );
}

#[tokio::test]
async fn test_blank_id_is_rejected_before_dispatch() {
    let strategy = Arc::new(CountingStrategy::new(SourceKind::VideoHost, Duration::ZERO));
    let resolver = resolver_with(strategy.clone(), ResolverConfig::default());

    let err = resolver.resolve("  ", SourceKind::VideoHost, None).await.unwrap_err();
    assert!(matches!(err, ResolutionError::InvalidRequest(_)));
    assert_eq!(strategy.calls(), 0);
}
