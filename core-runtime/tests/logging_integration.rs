//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_url, LogFormat, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_second_initialization_is_an_error() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    assert!(init_logging(config.clone()).is_ok());
    assert!(matches!(init_logging(config), Err(Error::Config(_))));

    tracing::warn!(url = %redact_url("https://cdn.example/a?sig=1"), "logged after init");
}

#[test]
fn test_stream_urls_lose_signatures() {
    let url = "https://pipedproxy.example/videoplayback?id=o-AB&expire=1700000000&signature=x";
    let redacted = redact_url(url);

    assert!(redacted.starts_with("https://pipedproxy.example/videoplayback"));
    assert!(!redacted.contains("signature"));
    assert!(!redacted.contains("expire"));
}

#[test]
fn test_credential_fields_are_masked() {
    assert_eq!(redact_if_sensitive("client_id", "a1b2c3"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "k"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("title", "Song Name"), "Song Name");
}

#[test]
fn test_format_selection() {
    let config = LoggingConfig::default();

    #[cfg(debug_assertions)]
    assert_eq!(config.format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(config.format, LogFormat::Json);

    assert!(config.redact_pii);
}
