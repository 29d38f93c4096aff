use core::time::Duration;

use anyhow::bail;
use clap::Parser;
use segid::BufferConfig;

/// Runtime configuration for the `segid-demo` binary.
///
/// Every value can come from a flag or from the environment (a `.env` file in
/// the working directory is loaded first). The defaults mirror a small
/// service: one tag, a step of a thousand and a store that answers in a few
/// milliseconds.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "segid-demo",
    version,
    about = "Allocates ids from many workers and checks they are unique and increasing"
)]
pub struct CliArgs {
    /// Number of concurrent workers requesting ids.
    ///
    /// Environment variable: `SEGID_WORKERS`
    #[arg(long, env = "SEGID_WORKERS", default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Number of ids each worker requests, spread round-robin over the tags.
    ///
    /// Environment variable: `SEGID_IDS_PER_WORKER`
    #[arg(long, env = "SEGID_IDS_PER_WORKER", default_value_t = 500)]
    pub ids_per_worker: usize,

    /// Comma separated business tags to allocate for.
    ///
    /// Environment variable: `SEGID_TAGS`
    #[arg(
        long,
        env = "SEGID_TAGS",
        value_delimiter = ',',
        default_value = "order-service"
    )]
    pub tags: Vec<String>,

    /// Segment size reserved per store round trip.
    ///
    /// Environment variable: `SEGID_STEP`
    #[arg(long, env = "SEGID_STEP", default_value_t = 1000)]
    pub step: u64,

    /// Fraction of the step left in the current segment when the next one is
    /// prefetched.
    ///
    /// Environment variable: `SEGID_LOW_WATER_RATIO`
    #[arg(long, env = "SEGID_LOW_WATER_RATIO", default_value_t = segid::DEFAULT_LOW_WATER_RATIO)]
    pub low_water_ratio: f64,

    /// Simulated store round trip in milliseconds.
    ///
    /// Environment variable: `SEGID_STORE_LATENCY_MS`
    #[arg(long, env = "SEGID_STORE_LATENCY_MS", default_value_t = 5)]
    pub store_latency_ms: u64,

    /// Upper bound of random extra latency added to each round trip, in
    /// milliseconds.
    ///
    /// Environment variable: `SEGID_STORE_JITTER_MS`
    #[arg(long, env = "SEGID_STORE_JITTER_MS", default_value_t = 0)]
    pub store_jitter_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub workers: usize,
    pub ids_per_worker: usize,
    pub tags: Vec<String>,
    pub step: u64,
    pub buffer: BufferConfig,
    pub store_latency: Duration,
    pub store_jitter: Duration,
}

impl DemoConfig {
    /// Total number of ids the run will allocate.
    pub const fn total_ids(&self) -> usize {
        self.workers * self.ids_per_worker
    }
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("SEGID_WORKERS must be greater than 0");
        }

        if args.ids_per_worker == 0 {
            bail!("SEGID_IDS_PER_WORKER must be greater than 0");
        }

        if args.step == 0 {
            bail!("SEGID_STEP must be greater than 0");
        }

        let tags: Vec<String> = args
            .tags
            .into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect();
        if tags.is_empty() {
            bail!("SEGID_TAGS must name at least one tag");
        }
        for (i, tag) in tags.iter().enumerate() {
            if tags[..i].contains(tag) {
                bail!("SEGID_TAGS lists `{tag}` more than once");
            }
        }

        args.workers
            .checked_mul(args.ids_per_worker)
            .ok_or_else(|| anyhow::anyhow!("Overflow in total id computation"))?;

        let buffer = BufferConfig::new().with_low_water_ratio(args.low_water_ratio)?;

        Ok(Self {
            workers: args.workers,
            ids_per_worker: args.ids_per_worker,
            tags,
            step: args.step,
            buffer,
            store_latency: Duration::from_millis(args.store_latency_ms),
            store_jitter: Duration::from_millis(args.store_jitter_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["segid-demo", "--workers", "4"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = DemoConfig::try_from(args(&[])).unwrap();
        assert_eq!(config.tags, ["order-service"]);
        assert_eq!(config.total_ids(), 2_000);
        assert_eq!(config.buffer, BufferConfig::default());
    }

    #[test]
    fn tags_are_split_and_trimmed() {
        let config = DemoConfig::try_from(args(&["--tags", "orders, users,,"])).unwrap();
        assert_eq!(config.tags, ["orders", "users"]);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(DemoConfig::try_from(args(&["--step", "0"])).is_err());
        assert!(DemoConfig::try_from(args(&["--ids-per-worker", "0"])).is_err());
        assert!(DemoConfig::try_from(args(&["--low-water-ratio", "1.5"])).is_err());
        assert!(DemoConfig::try_from(args(&["--tags", "orders,orders"])).is_err());
        assert!(DemoConfig::try_from(args(&["--tags", " "])).is_err());
    }
}
