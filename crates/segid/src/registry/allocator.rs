use std::{collections::HashMap, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    buffer::{BufferSnapshot, DoubleBuffer},
    config::BufferConfig,
    error::Result,
    mutex::{RwLock, acquire},
    spawn::{PrefetchSpawner, ThreadSpawner},
    store::SegmentStore,
};

/// Hands out ids for any number of business tags, one [`DoubleBuffer`] per
/// tag.
///
/// Buffers are created on first use and kept for the allocator's lifetime.
/// Lookups take a shared lock on the tag map; only the first request for an
/// unseen tag takes the exclusive lock, and it holds it while the new buffer
/// fetches its first segment. If that fetch fails nothing is registered, so
/// the next request for the tag starts over.
///
/// The allocator is an ordinary value: construct one per store and share it
/// (for example behind an [`Arc`]) with whatever needs ids.
///
/// # Example
/// ```
/// use segid::{MemorySegmentStore, SegmentAllocator};
///
/// let store = MemorySegmentStore::new();
/// store.register("orders", 1000).unwrap();
/// store.register("users", 10).unwrap();
///
/// let allocator = SegmentAllocator::new(store);
/// assert_eq!(allocator.get_id("orders").unwrap(), 1);
/// assert_eq!(allocator.get_id("orders").unwrap(), 2);
/// assert_eq!(allocator.get_id("users").unwrap(), 1);
/// assert!(allocator.get_id("unknown").is_err());
/// ```
pub struct SegmentAllocator<S, P = ThreadSpawner>
where
    S: SegmentStore,
    P: PrefetchSpawner + Clone,
{
    store: Arc<S>,
    spawner: P,
    config: BufferConfig,
    buffers: RwLock<HashMap<String, Arc<DoubleBuffer<S, P>>>>,
}

impl<S> SegmentAllocator<S, ThreadSpawner>
where
    S: SegmentStore,
{
    /// Creates an allocator that prefetches on OS threads with the default
    /// [`BufferConfig`].
    pub fn new(store: S) -> Self {
        Self::with_spawner(store, ThreadSpawner, BufferConfig::default())
    }
}

impl<S, P> SegmentAllocator<S, P>
where
    S: SegmentStore,
    P: PrefetchSpawner + Clone,
{
    /// Creates an allocator with an explicit spawner and config.
    pub fn with_spawner(store: S, spawner: P, config: BufferConfig) -> Self {
        Self::from_shared(Arc::new(store), spawner, config)
    }

    /// Creates an allocator over a store that is also used elsewhere, e.g. by
    /// another allocator in the same process.
    pub fn from_shared(store: Arc<S>, spawner: P, config: BufferConfig) -> Self {
        Self {
            store,
            spawner,
            config,
            buffers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the next id for `tag`, creating the tag's buffer on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::Initialization`] if `tag` is new and its first segment
    ///   could not be fetched. The tag stays unregistered.
    /// - Any error of [`DoubleBuffer::next_id`].
    ///
    /// [`Error::Initialization`]: crate::Error::Initialization
    pub fn get_id(&self, tag: &str) -> Result<u64, S::Err> {
        self.buffer(tag)?.next_id()
    }

    /// Creates the buffer for `tag` if it does not exist yet, without
    /// consuming an id.
    ///
    /// Useful at startup to move the first-segment fetch off the request
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the first segment could not be
    /// fetched.
    ///
    /// [`Error::Initialization`]: crate::Error::Initialization
    pub fn warm_up(&self, tag: &str) -> Result<(), S::Err> {
        self.buffer(tag).map(drop)
    }

    /// A snapshot of the buffer for `tag`, or `None` if the tag has not been
    /// used yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a lock was poisoned (std locks
    /// only).
    ///
    /// [`Error::LockPoisoned`]: crate::Error::LockPoisoned
    pub fn snapshot(&self, tag: &str) -> Result<Option<BufferSnapshot>, S::Err> {
        let buffer = {
            let buffers = acquire!(self.buffers.read());
            buffers.get(tag).cloned()
        };
        Ok(buffer.map(|buffer| buffer.snapshot()))
    }

    /// The tags that currently have a buffer, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a lock was poisoned (std locks
    /// only).
    ///
    /// [`Error::LockPoisoned`]: crate::Error::LockPoisoned
    pub fn tags(&self) -> Result<Vec<String>, S::Err> {
        let buffers = acquire!(self.buffers.read());
        Ok(buffers.keys().cloned().collect())
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The config every buffer is created with.
    pub const fn config(&self) -> &BufferConfig {
        &self.config
    }

    fn buffer(&self, tag: &str) -> Result<Arc<DoubleBuffer<S, P>>, S::Err> {
        {
            let buffers = acquire!(self.buffers.read());
            if let Some(buffer) = buffers.get(tag) {
                return Ok(Arc::clone(buffer));
            }
        }
        self.create_buffer(tag)
    }

    #[cold]
    #[inline(never)]
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    fn create_buffer(&self, tag: &str) -> Result<Arc<DoubleBuffer<S, P>>, S::Err> {
        let mut buffers = acquire!(self.buffers.write());

        // Another caller may have created it between our locks.
        if let Some(buffer) = buffers.get(tag) {
            return Ok(Arc::clone(buffer));
        }

        let buffer = Arc::new(DoubleBuffer::init(
            tag,
            Arc::clone(&self.store),
            self.spawner.clone(),
            self.config,
        )?);
        buffers.insert(tag.to_owned(), Arc::clone(&buffer));

        #[cfg(feature = "tracing")]
        tracing::info!(tags = buffers.len(), "registered business tag");

        Ok(buffer)
    }
}

impl<S, P> core::fmt::Debug for SegmentAllocator<S, P>
where
    S: SegmentStore,
    P: PrefetchSpawner + Clone,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SegmentAllocator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
