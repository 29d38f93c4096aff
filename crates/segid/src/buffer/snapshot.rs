/// A point-in-time view of one [`DoubleBuffer`].
///
/// Fields are read without stopping allocation, so under load they may
/// already be stale when inspected.
///
/// [`DoubleBuffer`]: crate::DoubleBuffer
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferSnapshot {
    /// Business tag served by the buffer.
    pub tag: String,
    /// Exclusive lower bound of the current segment.
    pub base: u64,
    /// Inclusive upper bound of the current segment.
    pub max: u64,
    /// Reservation size of the current segment.
    pub step: u64,
    /// Last id handed out from the current segment (`base` if none).
    pub cursor: u64,
    /// Whether a prefetched segment is staged.
    pub next_ready: bool,
    /// Whether a prefetch is in flight.
    pub loading: bool,
}

impl BufferSnapshot {
    /// Ids left in the current segment.
    pub const fn remaining(&self) -> u64 {
        self.max.saturating_sub(self.cursor)
    }
}
