use std::sync::Arc;

use arc_swap::ArcSwap;
use portable_atomic::{AtomicBool, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    buffer::BufferSnapshot,
    config::BufferConfig,
    error::{Error, Result},
    mutex::{Mutex, acquire},
    segment::Segment,
    spawn::{PrefetchSpawner, ThreadSpawner},
    store::SegmentStore,
};

/// Issues strictly increasing ids for one business tag from a pair of
/// segments: the one being served (`current`) and an optional prefetched
/// standby (`next`).
///
/// ## Hot path
/// Claiming an id is a lock-free load of the current segment followed by a
/// single atomic increment on its cursor. Swapping segments never blocks it.
///
/// ## Prefetch
/// Once the current segment's remaining capacity drops to
/// [`BufferConfig::threshold`], one background task (per buffer, at a time)
/// reserves the next segment through the [`PrefetchSpawner`] and stages it.
/// Failed prefetches are dropped; the next allocation that still sees the
/// segment below the threshold tries again.
///
/// ## Slow path
/// When the current segment is exhausted the caller takes the buffer mutex,
/// promotes the staged segment if there is one, and otherwise fetches a
/// segment synchronously. Failed fallback fetches leave the buffer untouched.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use segid::{BufferConfig, DoubleBuffer, MemorySegmentStore, ThreadSpawner};
///
/// let store = Arc::new(MemorySegmentStore::new());
/// store.register("orders", 1000).unwrap();
///
/// let buffer =
///     DoubleBuffer::init("orders", store, ThreadSpawner, BufferConfig::default()).unwrap();
/// assert_eq!(buffer.next_id().unwrap(), 1);
/// assert_eq!(buffer.next_id().unwrap(), 2);
/// ```
pub struct DoubleBuffer<S, P = ThreadSpawner>
where
    S: SegmentStore,
    P: PrefetchSpawner,
{
    pub(crate) shared: Arc<Shared<S>>,
    spawner: P,
    config: BufferConfig,
}

/// State reachable from both callers and the prefetch task.
pub(crate) struct Shared<S: SegmentStore> {
    tag: String,
    store: Arc<S>,
    /// Only replaced while holding `next`, and only once the segment it
    /// replaces has returned `None` from `advance`.
    current: ArcSwap<Segment>,
    /// The staged segment. Its lock is the buffer mutex: every promotion or
    /// fallback holds it.
    pub(crate) next: Mutex<Option<Segment>>,
    pub(crate) next_ready: AtomicBool,
    loading: AtomicBool,
}

impl<S, P> DoubleBuffer<S, P>
where
    S: SegmentStore,
    P: PrefetchSpawner,
{
    /// Creates a buffer for `tag` by synchronously fetching its first segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] carrying the store's error if the
    /// fetch fails, or [`Error::InvalidSegment`] if the store returned a
    /// segment beyond [`MAX_ID`]. No buffer is produced in either case; call
    /// again to retry.
    ///
    /// [`MAX_ID`]: crate::MAX_ID
    pub fn init(
        tag: impl Into<String>,
        store: Arc<S>,
        spawner: P,
        config: BufferConfig,
    ) -> Result<Self, S::Err> {
        let tag = tag.into();
        let first = match store.fetch_next_segment(&tag) {
            Ok(segment) => segment,
            Err(source) => return Err(Error::Initialization { tag, source }),
        };
        if !first.is_valid() {
            return Err(Error::InvalidSegment {
                base: first.base(),
                max: first.max(),
                tag,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            tag = %tag,
            base = first.base(),
            max = first.max(),
            "loaded initial segment"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                tag,
                store,
                current: ArcSwap::from_pointee(first),
                next: Mutex::new(None),
                next_ready: AtomicBool::new(false),
                loading: AtomicBool::new(false),
            }),
            spawner,
            config,
        })
    }

    /// The business tag this buffer serves.
    pub fn tag(&self) -> &str {
        &self.shared.tag
    }

    /// The config this buffer was created with.
    pub const fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Returns the next id for this buffer's tag.
    ///
    /// Ids from one buffer are strictly increasing in the order the calls
    /// complete. Most calls are a single atomic increment; see the type-level
    /// docs for when a call blocks.
    ///
    /// # Errors
    ///
    /// - [`Error::Allocation`] if both segments are exhausted and the
    ///   synchronous fallback fetch fails. The buffer is unchanged and the
    ///   call may be retried.
    /// - [`Error::EmptySegment`] if the fallback fetch returns a segment with
    ///   no capacity.
    /// - [`Error::InvalidSegment`] if the fallback fetch returns a segment
    ///   beyond [`MAX_ID`](crate::MAX_ID). The buffer is unchanged.
    /// - [`Error::LockPoisoned`] if a lock was poisoned (std locks only).
    pub fn next_id(&self) -> Result<u64, S::Err> {
        let claimed = self.shared.current.load().advance();

        match claimed {
            Some(id) => {
                self.check_and_load_next();
                Ok(id)
            }
            None => self.next_id_slow(),
        }
    }

    /// Starts a background prefetch of the next segment if the current one
    /// has crossed the low-water mark.
    ///
    /// Never blocks and never fails. Does nothing if a segment is already
    /// staged, a prefetch is already in flight, or more than
    /// [`BufferConfig::threshold`] ids remain.
    pub fn check_and_load_next(&self) {
        let shared = &self.shared;
        if shared.next_ready.load(Ordering::Acquire) || shared.loading.load(Ordering::Acquire) {
            return;
        }

        let (remaining, step) = {
            let current = shared.current.load();
            (current.remaining(), current.step())
        };
        if remaining > self.config.threshold(step) {
            return;
        }

        if shared
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(tag = %shared.tag, remaining, "starting prefetch");

        let guard = LoadingGuard(Arc::clone(shared));
        self.spawner.spawn(move || {
            let guard = guard;
            guard.0.prefetch();
        });
    }

    /// Returns a point-in-time view of the buffer's state.
    pub fn snapshot(&self) -> BufferSnapshot {
        let current = self.shared.current.load();
        BufferSnapshot {
            tag: self.shared.tag.clone(),
            base: current.base(),
            max: current.max(),
            step: current.step(),
            cursor: current.cursor(),
            next_ready: self.shared.next_ready.load(Ordering::Acquire),
            loading: self.shared.loading.load(Ordering::Acquire),
        }
    }

    #[cold]
    #[inline(never)]
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(tag = %self.shared.tag))
    )]
    fn next_id_slow(&self) -> Result<u64, S::Err> {
        let shared = &self.shared;
        let mut next = acquire!(shared.next.lock());

        // Another caller may have swapped segments while we waited.
        if let Some(id) = shared.current.load().advance() {
            return Ok(id);
        }

        if shared.next_ready.load(Ordering::Acquire) {
            shared.next_ready.store(false, Ordering::Release);
            if let Some(staged) = next.take() {
                let current_max = shared.current.load().max();
                // A prefetch that raced a fallback fetch can stage a range
                // below the one now being served.
                if staged.base() >= current_max {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        base = staged.base(),
                        max = staged.max(),
                        "promoting staged segment"
                    );
                    let staged = Arc::new(staged);
                    shared.current.store(Arc::clone(&staged));
                    if let Some(id) = staged.advance() {
                        return Ok(id);
                    }
                } else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        base = staged.base(),
                        current_max,
                        "discarding stale staged segment"
                    );
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::warn!("no staged segment, fetching synchronously");

        let fresh = match shared.store.fetch_next_segment(&shared.tag) {
            Ok(segment) => segment,
            Err(source) => {
                return Err(Error::Allocation {
                    tag: shared.tag.clone(),
                    source,
                });
            }
        };

        if !fresh.is_valid() {
            return Err(Error::InvalidSegment {
                tag: shared.tag.clone(),
                base: fresh.base(),
                max: fresh.max(),
            });
        }

        let fresh = Arc::new(fresh);
        shared.current.store(Arc::clone(&fresh));
        *next = None;
        shared.next_ready.store(false, Ordering::Release);

        fresh.advance().ok_or_else(|| Error::EmptySegment {
            tag: shared.tag.clone(),
        })
    }
}

impl<S: SegmentStore> Shared<S> {
    pub(crate) fn prefetch(&self) {
        match self.store.fetch_next_segment(&self.tag) {
            Ok(segment) if !segment.is_valid() => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    tag = %self.tag,
                    base = segment.base(),
                    max = segment.max(),
                    "prefetched segment is outside the id space, dropping it"
                );
            }
            Ok(segment) => {
                #[cfg(feature = "parking-lot")]
                let mut next = self.next.lock();
                #[cfg(not(feature = "parking-lot"))]
                let Ok(mut next) = self.next.lock() else {
                    return;
                };

                // A prefetch that started just as an earlier one finished
                // finds its slot taken. The staged range is older and is
                // served first; this one is left unused.
                if let Some(_staged) = next.as_ref() {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        tag = %self.tag,
                        staged_base = _staged.base(),
                        base = segment.base(),
                        max = segment.max(),
                        "a segment is already staged, dropping the prefetched one"
                    );
                    return;
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    tag = %self.tag,
                    base = segment.base(),
                    max = segment.max(),
                    "staged prefetched segment"
                );
                *next = Some(segment);
                self.next_ready.store(true, Ordering::Release);
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(tag = %self.tag, "prefetch failed: {_e}");
            }
        }
    }
}

/// Owned by the prefetch task. Clears the single-flight flag when dropped,
/// whether the task ran to completion or was dropped unrun.
struct LoadingGuard<S: SegmentStore>(Arc<Shared<S>>);

impl<S: SegmentStore> Drop for LoadingGuard<S> {
    fn drop(&mut self) {
        self.0.loading.store(false, Ordering::Release);
    }
}

impl<S, P> core::fmt::Debug for DoubleBuffer<S, P>
where
    S: SegmentStore,
    P: PrefetchSpawner,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("tag", &self.shared.tag)
            .field("next_ready", &self.shared.next_ready.load(Ordering::Relaxed))
            .field("loading", &self.shared.loading.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
