#![doc = include_str!("../README.md")]

mod config;
mod store;
mod telemetry;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};

use anyhow::{Context, bail};
use clap::Parser;
use config::{CliArgs, DemoConfig};
use segid::{MemorySegmentStore, SegmentAllocator, TokioSpawner};
use store::LatencyStore;
use telemetry::init_telemetry;

type Allocator = SegmentAllocator<LatencyStore<MemorySegmentStore>, TokioSpawner>;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DemoConfig::try_from(args)?;

    init_telemetry();
    log_startup_info(&config);

    let memory = MemorySegmentStore::new();
    for tag in &config.tags {
        memory.register(tag.as_str(), config.step)?;
    }
    let store = LatencyStore::new(memory, config.store_latency, config.store_jitter);
    let allocator: Arc<Allocator> = Arc::new(SegmentAllocator::with_spawner(
        store,
        TokioSpawner::try_current()?,
        config.buffer,
    ));

    // First segments are fetched before the clock starts.
    {
        let allocator = Arc::clone(&allocator);
        let tags = config.tags.clone();
        tokio::task::spawn_blocking(move || {
            tags.iter().try_for_each(|tag| allocator.warm_up(tag))
        })
        .await??;
    }
    let warm_fetches = allocator.store().inner().fetch_count();

    let start = Instant::now();
    let workers = (0..config.workers).map(|worker| {
        let allocator = Arc::clone(&allocator);
        let tags = config.tags.clone();
        let count = config.ids_per_worker;
        tokio::task::spawn_blocking(move || run_worker(worker, &allocator, &tags, count))
    });
    let results = futures::future::join_all(workers).await;
    let elapsed = start.elapsed();

    let mut seen: HashMap<String, HashSet<u64>> = HashMap::new();
    for result in results {
        for (tag, ids) in result.context("worker panicked")?? {
            let seen = seen.entry(tag).or_default();
            for id in ids {
                if !seen.insert(id) {
                    bail!("id {id} was handed out twice");
                }
            }
        }
    }

    let total: usize = seen.values().map(HashSet::len).sum();
    if total != config.total_ids() {
        bail!("expected {} ids, collected {total}", config.total_ids());
    }

    let fetches = allocator.store().inner().fetch_count() - warm_fetches;
    tracing::info!(
        ids = total,
        elapsed_ms = elapsed.as_millis() as u64,
        ids_per_sec = (total as f64 / elapsed.as_secs_f64()) as u64,
        store_fetches = fetches,
        "all ids unique and increasing per worker"
    );

    for tag in &config.tags {
        let ids = &seen[tag];
        if let Some(snapshot) = allocator.snapshot(tag)? {
            tracing::info!(
                tag = %tag,
                ids = ids.len(),
                first = ids.iter().min().copied().unwrap_or_default(),
                last = ids.iter().max().copied().unwrap_or_default(),
                segment = ?(snapshot.base, snapshot.max),
                remaining = snapshot.remaining(),
                next_ready = snapshot.next_ready,
                "tag summary"
            );
        }
    }

    Ok(())
}

/// Requests `count` ids round-robin over `tags` and checks that each tag's
/// ids come back strictly increasing.
fn run_worker(
    worker: usize,
    allocator: &Allocator,
    tags: &[String],
    count: usize,
) -> anyhow::Result<HashMap<String, Vec<u64>>> {
    let mut ids: HashMap<String, Vec<u64>> = tags
        .iter()
        .map(|tag| (tag.clone(), Vec::with_capacity(count / tags.len() + 1)))
        .collect();

    for i in 0..count {
        let tag = &tags[i % tags.len()];
        let id = allocator
            .get_id(tag)
            .with_context(|| format!("worker {worker} failed to allocate for `{tag}`"))?;

        let issued = ids.entry(tag.clone()).or_default();
        if let Some(&last) = issued.last() {
            if id <= last {
                bail!("worker {worker} got {id} after {last} for `{tag}`");
            }
        }
        issued.push(id);
    }

    tracing::debug!(worker, count, "worker finished");
    Ok(ids)
}

fn log_startup_info(config: &DemoConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting segid demo with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting segid demo with {} workers x {} ids over {} tags",
            config.workers,
            config.ids_per_worker,
            config.tags.len()
        );
    }
}
