use portable_atomic::{AtomicU64, Ordering};

/// The largest `max` a [`Segment`] may carry.
///
/// Exhausted segments keep absorbing increments from callers racing towards
/// the slow path, so the cursor may run past `max`. Capping ids at
/// `i64::MAX` leaves the upper half of the `u64` space as headroom for that
/// overshoot and keeps ids representable in signed `BIGINT` columns.
pub const MAX_ID: u64 = i64::MAX as u64;

/// A contiguous range of ids reserved from a [`SegmentStore`].
///
/// The range is `(base, max]`: `base` is the last id granted before this
/// segment began and `max` is the last id this segment may issue. The cursor
/// starts at `base` and records the last id handed out.
///
/// [`SegmentStore`]: crate::SegmentStore
#[derive(Debug)]
pub struct Segment {
    base: u64,
    max: u64,
    step: u64,
    #[cfg(feature = "cache-padded")]
    cursor: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    cursor: AtomicU64,
}

impl Segment {
    /// Creates a segment covering `(base, max]`, reserved with `step`.
    ///
    /// Bounds are not checked here. A [`DoubleBuffer`] refuses to serve a
    /// segment that is not [`is_valid`](Self::is_valid).
    ///
    /// [`DoubleBuffer`]: crate::DoubleBuffer
    pub fn new(base: u64, max: u64, step: u64) -> Self {
        Self {
            base,
            max,
            step,
            #[cfg(feature = "cache-padded")]
            cursor: crossbeam_utils::CachePadded::new(AtomicU64::new(base)),
            #[cfg(not(feature = "cache-padded"))]
            cursor: AtomicU64::new(base),
        }
    }

    /// Creates the segment produced by advancing a persisted boundary to
    /// `max` by `step`, i.e. `(max - step, max]`.
    pub fn from_boundary(max: u64, step: u64) -> Self {
        Self::new(max.saturating_sub(step), max, step)
    }

    /// Exclusive lower bound of the range.
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Inclusive upper bound of the range.
    pub const fn max(&self) -> u64 {
        self.max
    }

    /// Reservation size that produced this segment.
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Last id handed out, or `base` if none has been.
    ///
    /// The raw cursor may have overshot `max` while callers were racing to
    /// replace an exhausted segment; the value returned here is clamped.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed).min(self.max)
    }

    /// Ids left to hand out.
    ///
    /// Only a heuristic for prefetch timing: concurrent callers may consume
    /// the reported ids before the caller acts on the value.
    pub fn remaining(&self) -> u64 {
        self.max.saturating_sub(self.cursor.load(Ordering::Relaxed))
    }

    /// Whether `base <= max <= MAX_ID`.
    ///
    /// Above [`MAX_ID`] the cursor could wrap around past `u64::MAX` and
    /// start issuing small ids again.
    pub const fn is_valid(&self) -> bool {
        self.base <= self.max && self.max <= MAX_ID
    }

    /// Whether every id in the range has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Claims the next id, or `None` once the range is used up.
    ///
    /// Every successful claim is strictly greater than all earlier successful
    /// claims on the same segment.
    #[inline]
    pub(crate) fn advance(&self) -> Option<u64> {
        let prev = self.cursor.fetch_add(1, Ordering::Relaxed);
        if prev < self.max { Some(prev + 1) } else { None }
    }
}
