mod workload;

use clap::{Args, Parser, Subcommand};
use shardscan_core::{CpuBackend, DistanceType, SearchConfig};
use shardscan_search::{ShardSearchDispatcher, SearchOutcome};
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use workload::{reference_top_k, Layout, Workload};

/// Exact k-nearest-neighbor search over a sharded synthetic dataset
#[derive(Parser, Debug)]
#[command(name = "shardscan")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// JSON search config. Falls back to SHARDSCAN_* environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for the shard pool (overrides the config)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one search and print the neighbors of the first queries
    Search {
        #[command(flatten)]
        workload: WorkloadArgs,

        /// Query rows to print
        #[arg(long, default_value_t = 3)]
        show: usize,
    },
    /// Run one search and compare it against a single-pass full sort
    Verify {
        #[command(flatten)]
        workload: WorkloadArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct WorkloadArgs {
    #[arg(long, default_value_t = 4)]
    shards: usize,

    /// Total reference rows across all shards
    #[arg(long, default_value_t = 10_000)]
    rows: usize,

    #[arg(long, default_value_t = 32)]
    dim: usize,

    #[arg(long, default_value_t = 16)]
    queries: usize,

    #[arg(short, long, default_value_t = 10)]
    k: usize,

    #[arg(long, default_value = "l2_sqrt")]
    metric: DistanceType,

    /// Simulated devices the CPU backend answers for, besides the host
    #[arg(long, default_value_t = 0)]
    devices: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Put this shard on a device nobody serves, to see it excluded
    #[arg(long)]
    fail_shard: Option<usize>,
}

impl WorkloadArgs {
    fn layout(&self) -> Layout {
        Layout {
            shards: self.shards,
            rows: self.rows,
            dim: self.dim,
            queries: self.queries,
            devices: self.devices,
            seed: self.seed,
            fail_shard: self.fail_shard,
        }
    }
}

fn load_config(cli: &Cli) -> Result<SearchConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => SearchConfig::from_env()?,
    };
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    Ok(config)
}

fn run_search(
    args: &WorkloadArgs,
    config: SearchConfig,
) -> Result<(Workload, SearchOutcome), Box<dyn Error>> {
    println!(
        "📦 Generating {} rows x {} dims in {} shards (seed {})...",
        args.rows, args.dim, args.shards, args.seed
    );
    let workload = Workload::generate(&args.layout());

    let dispatcher = ShardSearchDispatcher::with_config(CpuBackend::with_devices(args.devices), config)?;

    println!("🔍 Searching {} queries, k={}, metric={}...", args.queries, args.k, args.metric);
    let start = Instant::now();
    let outcome = dispatcher.search(
        &workload.shards,
        workload.queries.view(),
        args.k,
        args.metric,
        None,
    )?;
    println!("⏱️  Search done in {:.2?}", start.elapsed());

    for failure in outcome.failures() {
        println!("⚠️  {failure}");
    }
    Ok((workload, outcome))
}

fn verify(args: &WorkloadArgs, workload: &Workload, outcome: &SearchOutcome) -> bool {
    // rows owned by failed shards are not expected in the answer
    let mut bounds = Vec::with_capacity(workload.shards.len());
    let mut start = 0;
    for shard in &workload.shards {
        bounds.push(start..start + shard.rows());
        start += shard.rows();
    }
    let excluded: Vec<_> = outcome
        .failures()
        .map(|failure| bounds[failure.shard].clone())
        .collect();

    let expected = reference_top_k(workload.data.view(), workload.queries.view(), args.k, |row| {
        excluded.iter().any(|range| range.contains(&row))
    });

    let mut mismatches = 0;
    for (row, want) in expected.iter().enumerate() {
        let got = outcome.neighbors(row);
        let same = got.len() == want.len()
            && got.iter().zip(want).all(|(&(gl, gd), &(wl, wd))| {
                let wd = if args.metric.is_sqrt() { wd.sqrt() } else { wd };
                gl == wl && (gd - wd).abs() <= 1e-4 * wd.max(1.0)
            });
        if !same {
            mismatches += 1;
            println!("❌ Query {row}: expected {want:?}, got {got:?}");
        }
    }
    mismatches == 0
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli)?;
    tracing::debug!(?config, "search config loaded");

    match &cli.command {
        Command::Search { workload: args, show } => {
            let (_, outcome) = run_search(args, config)?;
            for row in 0..(*show).min(args.queries) {
                println!("Query {row}:");
                for (rank, (label, dist)) in outcome.neighbors(row).into_iter().enumerate() {
                    println!("  #{rank:<3} id={label:<8} dist={dist:.6}");
                }
            }
            println!(
                "✅ {} of {} shards answered",
                outcome.shards.len() - outcome.failed_count(),
                outcome.shards.len()
            );
        }
        Command::Verify { workload: args } => {
            let (workload, outcome) = run_search(args, config)?;
            println!("🧮 Computing reference answer by full sort...");
            if verify(args, &workload, &outcome) {
                println!("✅ Sharded result matches the reference for all {} queries", args.queries);
            } else {
                return Err("sharded result differs from the reference".into());
            }
        }
    }

    Ok(())
}
