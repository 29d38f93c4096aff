use core::time::Duration;

use rand::Rng;
use segid::{Segment, SegmentStore};

/// Wraps a store and sleeps before every fetch, standing in for the network
/// and transaction cost of a real database round trip.
#[derive(Debug)]
pub struct LatencyStore<S> {
    inner: S,
    latency: Duration,
    jitter: Duration,
}

impl<S> LatencyStore<S> {
    pub const fn new(inner: S, latency: Duration, jitter: Duration) -> Self {
        Self {
            inner,
            latency,
            jitter,
        }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn round_trip(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.latency;
        }
        let extra = rand::rng().random_range(Duration::ZERO..=self.jitter);
        self.latency + extra
    }
}

impl<S> SegmentStore for LatencyStore<S>
where
    S: SegmentStore,
{
    type Err = S::Err;

    fn fetch_next_segment(&self, tag: &str) -> Result<Segment, Self::Err> {
        let delay = self.round_trip();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.inner.fetch_next_segment(tag)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use segid::MemorySegmentStore;

    use super::*;

    #[test]
    fn delays_then_delegates() {
        let memory = MemorySegmentStore::new();
        memory.register("orders", 10).unwrap();
        let store = LatencyStore::new(memory, Duration::from_millis(20), Duration::from_millis(5));

        let start = Instant::now();
        let segment = store.fetch_next_segment("orders").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!((segment.base(), segment.max()), (0, 10));
        assert_eq!(store.inner().fetch_count(), 1);
    }
}
