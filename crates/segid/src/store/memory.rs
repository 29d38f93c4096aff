use std::collections::HashMap;

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    mutex::{Mutex, acquire},
    segment::{MAX_ID, Segment},
    store::SegmentStore,
};

/// Errors returned by [`MemorySegmentStore`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No row exists for the requested business tag.
    #[error("unknown business tag `{tag}`")]
    UnknownTag {
        /// The requested tag.
        tag: String,
    },

    /// A row already exists for the business tag.
    #[error("business tag `{tag}` is already registered")]
    DuplicateTag {
        /// The registered tag.
        tag: String,
    },

    /// A step of zero would reserve empty segments.
    #[error("step for `{tag}` must be greater than zero")]
    InvalidStep {
        /// The tag the step was given for.
        tag: String,
    },

    /// Advancing the boundary would exceed [`MAX_ID`].
    #[error("advancing `{tag}` from {max_id} by {step} exceeds the id space")]
    Overflow {
        /// The tag being advanced.
        tag: String,
        /// The persisted boundary before the advance.
        max_id: u64,
        /// The step that could not be applied.
        step: u64,
    },

    /// The table lock was poisoned by a panicking thread.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("store lock poisoned")]
    LockPoisoned,
}

#[cfg(not(feature = "parking-lot"))]
impl<G> From<crate::mutex::PoisonError<G>> for StoreError {
    fn from(_: crate::mutex::PoisonError<G>) -> Self {
        Self::LockPoisoned
    }
}

#[derive(Clone, Copy, Debug)]
struct Row {
    max_id: u64,
    step: u64,
}

/// An in-process [`SegmentStore`] holding one `{tag, max_id, step}` row per
/// business tag.
///
/// Every fetch runs under a single lock, so reservations are atomic across
/// all threads sharing the store. Nothing is persisted: a restarted process
/// starts from whatever boundaries it registers. Use
/// [`MemorySegmentStore::register_from`] to resume from a boundary recorded
/// elsewhere.
///
/// # Example
/// ```
/// use segid::{MemorySegmentStore, SegmentStore};
///
/// let store = MemorySegmentStore::new();
/// store.register("orders", 1000).unwrap();
///
/// let first = store.fetch_next_segment("orders").unwrap();
/// let second = store.fetch_next_segment("orders").unwrap();
/// assert_eq!((first.base(), first.max()), (0, 1000));
/// assert_eq!((second.base(), second.max()), (1000, 2000));
/// ```
#[derive(Debug, Default)]
pub struct MemorySegmentStore {
    rows: Mutex<HashMap<String, Row>>,
    fetches: AtomicU64,
}

impl MemorySegmentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tag` with a boundary of zero.
    ///
    /// # Errors
    ///
    /// See [`MemorySegmentStore::register_from`].
    pub fn register(&self, tag: impl Into<String>, step: u64) -> Result<(), StoreError> {
        self.register_from(tag, 0, step)
    }

    /// Registers `tag` with an existing boundary: the first segment handed out
    /// is `(max_id, max_id + step]`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidStep`] if `step` is zero.
    /// - [`StoreError::Overflow`] if `max_id` exceeds [`MAX_ID`].
    /// - [`StoreError::DuplicateTag`] if `tag` already has a row; boundaries
    ///   only ever move forward through fetches.
    pub fn register_from(
        &self,
        tag: impl Into<String>,
        max_id: u64,
        step: u64,
    ) -> Result<(), StoreError> {
        let tag = tag.into();
        if step == 0 {
            return Err(StoreError::InvalidStep { tag });
        }
        if max_id > MAX_ID {
            return Err(StoreError::Overflow { tag, max_id, step });
        }

        let mut rows = acquire!(self.rows.lock());
        if rows.contains_key(&tag) {
            return Err(StoreError::DuplicateTag { tag });
        }
        rows.insert(tag, Row { max_id, step });
        Ok(())
    }

    /// Changes the reservation size for `tag`, effective from the next fetch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidStep`] for a zero step and
    /// [`StoreError::UnknownTag`] if the tag has no row.
    pub fn set_step(&self, tag: &str, step: u64) -> Result<(), StoreError> {
        if step == 0 {
            return Err(StoreError::InvalidStep { tag: tag.to_owned() });
        }
        let mut rows = acquire!(self.rows.lock());
        let row = rows.get_mut(tag).ok_or_else(|| StoreError::UnknownTag {
            tag: tag.to_owned(),
        })?;
        row.step = step;
        Ok(())
    }

    /// The persisted boundary for `tag`, i.e. the largest id reserved so far.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTag`] if the tag has no row.
    pub fn max_id(&self, tag: &str) -> Result<u64, StoreError> {
        let rows = acquire!(self.rows.lock());
        rows.get(tag)
            .map(|row| row.max_id)
            .ok_or_else(|| StoreError::UnknownTag {
                tag: tag.to_owned(),
            })
    }

    /// Number of successful reservations made across all tags.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl SegmentStore for MemorySegmentStore {
    type Err = StoreError;

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn fetch_next_segment(&self, tag: &str) -> Result<Segment, StoreError> {
        let mut rows = acquire!(self.rows.lock());
        let row = rows.get_mut(tag).ok_or_else(|| StoreError::UnknownTag {
            tag: tag.to_owned(),
        })?;

        let max_id = row
            .max_id
            .checked_add(row.step)
            .filter(|max| *max <= MAX_ID)
            .ok_or_else(|| StoreError::Overflow {
                tag: tag.to_owned(),
                max_id: row.max_id,
                step: row.step,
            })?;
        row.max_id = max_id;
        self.fetches.fetch_add(1, Ordering::Relaxed);

        Ok(Segment::from_boundary(max_id, row.step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetches_advance_the_boundary_by_step() {
        let store = MemorySegmentStore::new();
        store.register("orders", 100).unwrap();

        for round in 0..5 {
            let segment = store.fetch_next_segment("orders").unwrap();
            assert_eq!(segment.base(), round * 100);
            assert_eq!(segment.max(), (round + 1) * 100);
            assert_eq!(segment.step(), 100);
        }
        assert_eq!(store.max_id("orders").unwrap(), 500);
        assert_eq!(store.fetch_count(), 5);
    }

    #[test]
    fn step_changes_apply_to_the_next_fetch() {
        let store = MemorySegmentStore::new();
        store.register_from("users", 1_000, 10).unwrap();

        let first = store.fetch_next_segment("users").unwrap();
        assert_eq!((first.base(), first.max()), (1_000, 1_010));

        store.set_step("users", 50).unwrap();
        let second = store.fetch_next_segment("users").unwrap();
        assert_eq!((second.base(), second.max(), second.step()), (1_010, 1_060, 50));
    }

    #[test]
    fn rejects_bad_rows() {
        let store = MemorySegmentStore::new();
        assert_eq!(
            store.register("zero", 0),
            Err(StoreError::InvalidStep {
                tag: "zero".to_owned()
            })
        );
        store.register("dup", 1).unwrap();
        assert_eq!(
            store.register("dup", 1),
            Err(StoreError::DuplicateTag {
                tag: "dup".to_owned()
            })
        );
        assert_eq!(
            store.fetch_next_segment("missing").unwrap_err(),
            StoreError::UnknownTag {
                tag: "missing".to_owned()
            }
        );
        assert_eq!(store.fetch_count(), 0);
    }

    #[test]
    fn refuses_to_pass_max_id() {
        let store = MemorySegmentStore::new();
        store.register_from("edge", MAX_ID - 5, 10).unwrap();
        assert!(matches!(
            store.fetch_next_segment("edge"),
            Err(StoreError::Overflow { step: 10, .. })
        ));
        assert_eq!(store.max_id("edge").unwrap(), MAX_ID - 5);
    }

    #[test]
    fn concurrent_fetches_never_overlap() {
        let store = MemorySegmentStore::new();
        store.register("shared", 7).unwrap();

        let mut ranges: Vec<(u64, u64)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        (0..50)
                            .map(|_| {
                                let seg = store.fetch_next_segment("shared").unwrap();
                                (seg.base(), seg.max())
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        ranges.sort_unstable();
        assert_eq!(ranges.len(), 400);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "ranges must tile without overlap");
        }
    }
}
