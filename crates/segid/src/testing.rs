//! Mock stores and spawners shared by the unit tests.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{MemorySegmentStore, PrefetchSpawner, Segment, SegmentStore, StoreError};

/// Runs each prefetch on the calling thread before returning.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineSpawner;

impl PrefetchSpawner for InlineSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        task();
    }
}

/// Drops every prefetch unrun, as a spawner that failed to schedule would.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropSpawner;

impl PrefetchSpawner for DropSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        drop(task);
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// Holds prefetches until the test releases them.
#[derive(Clone, Default)]
pub struct QueueSpawner {
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl QueueSpawner {
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn run_all(&self) {
        let tasks: Vec<Task> = core::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            task();
        }
    }
}

impl PrefetchSpawner for QueueSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.lock().unwrap().push(Box::new(task));
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FlakyError {
    #[error("injected failure on call {0}")]
    Injected(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A [`MemorySegmentStore`] that fails chosen calls (1-based, counted across
/// all tags).
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemorySegmentStore,
    calls: AtomicUsize,
    failing: Mutex<HashSet<usize>>,
}

impl FlakyStore {
    pub fn with_tag(tag: &str, step: u64) -> Self {
        let store = Self::default();
        store.inner.register(tag, step).unwrap();
        store
    }

    pub fn fail_calls(self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.failing.lock().unwrap().extend(calls);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SegmentStore for FlakyStore {
    type Err = FlakyError;

    fn fetch_next_segment(&self, tag: &str) -> Result<Segment, FlakyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.lock().unwrap().contains(&call) {
            return Err(FlakyError::Injected(call));
        }
        Ok(self.inner.fetch_next_segment(tag)?)
    }
}

/// Polls `condition` until it holds, panicking after five seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Returns the given segments in order, then fails with
/// [`StoreError::UnknownTag`].
#[derive(Debug)]
pub struct ScriptedStore {
    segments: Mutex<Vec<Segment>>,
}

impl ScriptedStore {
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut segments: Vec<Segment> = segments.into_iter().collect();
        segments.reverse();
        Self {
            segments: Mutex::new(segments),
        }
    }
}

impl SegmentStore for ScriptedStore {
    type Err = StoreError;

    fn fetch_next_segment(&self, tag: &str) -> Result<Segment, StoreError> {
        self.segments
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| StoreError::UnknownTag {
                tag: tag.to_owned(),
            })
    }
}
