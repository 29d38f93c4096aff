/// A result type carrying [`Error`] parameterised over the store's error.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// All error variants that `segid` can emit.
///
/// `E` is the error type of the backing [`SegmentStore`]. Store failures are
/// never rewritten: the original error is kept as the variant's `source` so
/// callers can match on it directly (see [`Error::store_error`]).
///
/// [`SegmentStore`]: crate::SegmentStore
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error<E> {
    /// The first segment fetch for a new business tag failed.
    ///
    /// The tag is not registered, so the next request for it retries creation
    /// from scratch.
    #[error("failed to initialize segment buffer for tag `{tag}`")]
    Initialization {
        /// Business tag whose buffer could not be created.
        tag: String,
        /// The store error, unchanged.
        #[source]
        source: E,
    },

    /// The synchronous fallback fetch failed while both the current and the
    /// staged segment were exhausted.
    ///
    /// No segment was installed, so retrying is safe.
    #[error("failed to fetch a fallback segment for tag `{tag}`")]
    Allocation {
        /// Business tag whose buffer ran dry.
        tag: String,
        /// The store error, unchanged.
        #[source]
        source: E,
    },

    /// The store handed out a segment with no capacity (`base == max`).
    #[error("store returned an empty segment for tag `{tag}`")]
    EmptySegment {
        /// Business tag the empty segment was fetched for.
        tag: String,
    },

    /// The store handed out a segment outside `base <= max <= MAX_ID`.
    ///
    /// The segment is never served. A buffer that was already running keeps
    /// its previous state.
    #[error("store returned segment ({base}, {max}] for tag `{tag}`, outside the id space")]
    InvalidSegment {
        /// Business tag the segment was fetched for.
        tag: String,
        /// Reported exclusive lower bound.
        base: u64,
        /// Reported inclusive upper bound.
        max: u64,
    },

    /// The operation failed because a lock was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, locks do **not** poison, so this
    /// variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("lock poisoned")]
    LockPoisoned,
}

impl<E> Error<E> {
    /// Returns the business tag this error relates to, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Initialization { tag, .. }
            | Self::Allocation { tag, .. }
            | Self::EmptySegment { tag }
            | Self::InvalidSegment { tag, .. } => Some(tag),
            #[cfg(not(feature = "parking-lot"))]
            Self::LockPoisoned => None,
        }
    }

    /// Returns the underlying store error, if the failure came from the store.
    pub const fn store_error(&self) -> Option<&E> {
        match self {
            Self::Initialization { source, .. } | Self::Allocation { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
use crate::mutex::PoisonError;
#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<G, E> From<PoisonError<G>> for Error<E> {
    fn from(_: PoisonError<G>) -> Self {
        Self::LockPoisoned
    }
}
