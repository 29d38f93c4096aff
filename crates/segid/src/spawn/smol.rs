use crate::spawn::PrefetchSpawner;

/// A [`PrefetchSpawner`] that runs prefetches on Smol's blocking thread pool.
///
/// Uses [`smol::unblock`] and detaches the resulting task, so no executor has
/// to be driven for the prefetch to make progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmolSpawner;

impl PrefetchSpawner for SmolSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        smol::unblock(task).detach();
    }
}
