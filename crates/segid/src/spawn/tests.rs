use std::sync::Arc;

use crate::{
    BufferConfig, DoubleBuffer, MemorySegmentStore, PrefetchSpawner, ThreadSpawner,
    testing::wait_until,
};

/// A buffer that starts prefetching on its first allocation.
fn eager_buffer<P>(spawner: P) -> (Arc<MemorySegmentStore>, DoubleBuffer<MemorySegmentStore, P>)
where
    P: PrefetchSpawner,
{
    let store = MemorySegmentStore::new();
    store.register("orders", 10).unwrap();
    let store = Arc::new(store);
    let config = BufferConfig::new().with_low_water_ratio(1.0).unwrap();
    let buffer = DoubleBuffer::init("orders", Arc::clone(&store), spawner, config).unwrap();
    (store, buffer)
}

#[test]
fn thread_spawner_stages_the_next_segment() {
    let (store, buffer) = eager_buffer(ThreadSpawner);
    assert_eq!(buffer.next_id().unwrap(), 1);

    wait_until(|| {
        let snapshot = buffer.snapshot();
        snapshot.next_ready && !snapshot.loading
    });
    assert_eq!(store.fetch_count(), 2);

    for expected in 2..=11 {
        assert_eq!(buffer.next_id().unwrap(), expected);
    }
}

#[cfg(feature = "async-tokio")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tokio_spawner_stages_the_next_segment() {
    use core::time::Duration;

    use crate::TokioSpawner;

    let (store, buffer) = eager_buffer(TokioSpawner::try_current().unwrap());
    assert_eq!(buffer.next_id().unwrap(), 1);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !buffer.snapshot().next_ready {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(store.fetch_count(), 2);
}

#[cfg(feature = "async-tokio")]
#[test]
fn tokio_spawner_needs_a_runtime() {
    assert!(crate::TokioSpawner::try_current().is_err());
}

#[cfg(feature = "async-smol")]
#[test]
fn smol_spawner_stages_the_next_segment() {
    let (store, buffer) = eager_buffer(crate::SmolSpawner);
    assert_eq!(buffer.next_id().unwrap(), 1);

    wait_until(|| buffer.snapshot().next_ready);
    assert_eq!(store.fetch_count(), 2);
}
