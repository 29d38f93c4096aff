use tokio::runtime::{Handle, TryCurrentError};

use crate::spawn::PrefetchSpawner;

/// A [`PrefetchSpawner`] that runs prefetches on Tokio's blocking pool.
///
/// Store calls are synchronous, so they go through
/// [`Handle::spawn_blocking`] rather than onto the async worker threads. The
/// join handle is dropped, which detaches the task; Tokio keeps it running
/// until it completes or the runtime shuts down.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Creates a spawner bound to `handle`.
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates a spawner bound to the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside of a Tokio runtime.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl PrefetchSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        drop(self.handle.spawn_blocking(task));
    }
}
