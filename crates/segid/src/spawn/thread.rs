use crate::spawn::PrefetchSpawner;

/// A [`PrefetchSpawner`] that runs each prefetch on its own OS thread.
///
/// This is the default spawner. Prefetches are rare (one per segment), so the
/// cost of a short-lived thread is negligible next to the store round trip,
/// and no runtime is required.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSpawner;

impl PrefetchSpawner for ThreadSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let spawned = std::thread::Builder::new()
            .name("segid-prefetch".into())
            .spawn(task);

        if let Err(_e) = spawned {
            #[cfg(feature = "tracing")]
            tracing::warn!("failed to spawn prefetch thread: {_e}");
        }
    }
}
