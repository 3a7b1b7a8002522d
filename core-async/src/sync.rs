//! Synchronization primitives.
//!
//! Async-aware locks and channels from `tokio::sync`. These are the only locks
//! that may be held across an `.await`; short, non-suspending critical
//! sections elsewhere in the workspace use `parking_lot`.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(1);
//!     *mutex.lock().await += 1;
//!
//!     let (tx, rx) = watch::channel(0u32);
//!     tx.send_modify(|value| *value += 1);
//!     assert_eq!(*rx.borrow(), 1);
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OnceCell, RwLock,
    RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
};
