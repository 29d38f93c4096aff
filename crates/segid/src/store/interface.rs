use crate::segment::Segment;

/// The backing store that reserves id ranges for business tags.
///
/// Each call must behave like a single transaction that advances the tag's
/// persisted boundary by its configured `step` and reads back the new
/// boundary, returning `(new_max - step, new_max]` as a [`Segment`]. The
/// reservation must be atomic with respect to every other caller, including
/// callers in other processes, so that no two segments for the same tag ever
/// overlap.
///
/// Calls are synchronous. They run on a background task for prefetches, and
/// on the caller's thread for initialization and for the fallback when both
/// buffered segments are exhausted. Implementations should bound their own
/// latency (connection and statement timeouts); the allocator never cancels
/// an in-flight fetch.
pub trait SegmentStore: Send + Sync + 'static {
    /// The error type returned by [`SegmentStore::fetch_next_segment`].
    type Err: core::error::Error + Send + Sync + 'static;

    /// Reserves the next segment for `tag`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the reservation could not be committed,
    /// for example when the tag is unknown or the store is unreachable.
    fn fetch_next_segment(&self, tag: &str) -> Result<Segment, Self::Err>;
}
