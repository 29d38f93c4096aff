/// Runs a prefetch in the background without the caller awaiting it.
///
/// A [`DoubleBuffer`] hands its spawner a task each time a segment crosses the
/// low-water mark. The task performs a blocking [`SegmentStore`] call, so
/// implementations must run it somewhere blocking is allowed and must keep
/// it alive until it completes.
///
/// If the task cannot be scheduled, simply drop it: the buffer's single-flight
/// flag is released when the task is dropped, whether or not it ran.
///
/// [`DoubleBuffer`]: crate::DoubleBuffer
/// [`SegmentStore`]: crate::SegmentStore
pub trait PrefetchSpawner: Send + Sync + 'static {
    /// Submits `task` for detached execution.
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static;
}
