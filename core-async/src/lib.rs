//! Runtime facade for the gapless playback core.
//!
//! All `core-*` and `bridge-*` crates take their timers, locks, channels and
//! task spawning from this crate instead of naming Tokio directly. Keeping a
//! single seam means the whole engine runs on one clock: tests can pause it
//! with `tokio::time::pause()` and every TTL check, auto-skip delay and
//! request timeout follows.
//!
//! # Modules
//!
//! - `task`: task spawning and join handles
//! - `time`: sleep, timeout and the monotonic [`Instant`](time::Instant)
//! - `sync`: async-aware locks, `watch`/`broadcast`/`mpsc` channels, `OnceCell`
//! - `runtime`: handle lookup and a blocking bridge for sync call sites
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
