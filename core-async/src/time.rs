//! Time-related abstractions.
//!
//! [`Instant`] is Tokio's instant rather than `std::time::Instant`. It is still
//! monotonic, but it honours a paused test clock, which is what lets cache TTL
//! and auto-skip tests run without wall-clock sleeps.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(5)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(5));
//! }
//! ```

pub use tokio::time::{error::Elapsed, interval, sleep, sleep_until, timeout, Instant, Interval, Sleep, Timeout};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns how long ago `earlier` happened, saturating at zero.
pub fn age_of(earlier: Instant) -> Duration {
    Instant::now().saturating_duration_since(earlier)
}
