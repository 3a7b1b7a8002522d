//! Runtime utilities.
//!
//! Most of the workspace is async all the way down. The exceptions are
//! callbacks invoked from outside any runtime (for example a `tracing` layer
//! firing on a host thread); those use [`Handle::try_current`] to hop onto the
//! ambient runtime and fall back to [`block_on`] when there is none.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Drive `future` to completion on a throwaway current-thread runtime.
///
/// Returns `None` when the runtime cannot be built (for example when the
/// process is out of file descriptors). Never call this from inside a Tokio
/// worker thread; use [`Handle::try_current`] and spawn instead.
pub fn block_on<F>(future: F) -> Option<F::Output>
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .ok()
        .map(|runtime| runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_on_runs_future_outside_runtime() {
        assert_eq!(block_on(async { 7 }), Some(7));
    }
}
