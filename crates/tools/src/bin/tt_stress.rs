/// 置換表の並列ストレステスト
///
/// 使い方:
///   # 64MB, 8スレッド, 5世代
///   tt_stress --hash 64 --threads 8 --rounds 5
///
///   # TOML設定から読み込む
///   tt_stress --config tt.toml
///
/// Each round advances the generation, then every thread probes and writes
/// random keys (part of them from a shared hot set) without synchronisation.
/// Hit rate and occupancy are printed per round.
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use ttable::types::{Bound, DEPTH_UNSEARCHED, Depth, MAX_STORABLE_DEPTH, Move, Value};
use ttable::{ThreadPool, TranspositionTable, TtConfig};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(about = "Concurrent probe/write stress test for the transposition table")]
struct Cli {
    /// TOML config (hash_mb, threads, [replacement])
    #[arg(long)]
    config: Option<PathBuf>,

    /// Table size in MB (overrides the config)
    #[arg(long)]
    hash: Option<usize>,

    /// Search threads (overrides the config)
    #[arg(long)]
    threads: Option<usize>,

    /// Generations to simulate
    #[arg(long, default_value_t = 5)]
    rounds: u32,

    /// Probes per thread per round
    #[arg(long, default_value_t = 200_000)]
    probes: u64,

    /// Size of the key set shared by all threads
    #[arg(long, default_value_t = 4096)]
    hot_keys: usize,

    /// Share of probes that hit the shared key set (0.0 - 1.0)
    #[arg(long, default_value_t = 0.5)]
    hot_ratio: f64,

    /// RNG seed
    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,
}

#[derive(Default)]
struct RoundStats {
    probes: AtomicU64,
    hits: AtomicU64,
    /// Hits whose fields decoded outside the ranges a writer can produce
    corrupt: AtomicU64,
}

fn load_config(cli: &Cli) -> Result<TtConfig> {
    let mut config = match &cli.config {
        Some(path) => TtConfig::from_file(path)?,
        None => TtConfig::default(),
    };
    if let Some(hash) = cli.hash {
        config.hash_mb = hash;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    config.validate()?;
    ensure!(cli.hot_keys >= 1, "--hot-keys must be at least 1");
    ensure!(
        (0.0..=1.0).contains(&cli.hot_ratio),
        "--hot-ratio must be within 0.0..=1.0, got {}",
        cli.hot_ratio
    );
    Ok(config)
}

/// 1スレッド分のprobe/writeループ
fn run_worker(tt: &TranspositionTable, cli: &Cli, hot: &[u64], seed: u64, stats: &RoundStats) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let generation8 = tt.generation();
    let mut hits = 0;
    let mut corrupt = 0;

    for _ in 0..cli.probes {
        let key = if rng.random_bool(cli.hot_ratio) {
            hot[rng.random_range(0..hot.len())]
        } else {
            rng.random::<u64>()
        };
        tt.prefetch(key);
        let probe = tt.probe(key);

        if probe.found {
            hits += 1;
            let data = probe.data;
            let depth_ok = (DEPTH_UNSEARCHED..=MAX_STORABLE_DEPTH).contains(&data.depth);
            if !depth_ok || data.bound == Bound::None || data.value.raw().abs() > 1000 {
                corrupt += 1;
            }
        }

        let depth: Depth = rng.random_range(0..40);
        let bound = match rng.random_range(0..3) {
            0 => Bound::Upper,
            1 => Bound::Lower,
            _ => Bound::Exact,
        };
        probe.writer.write(
            key,
            Value::new(rng.random_range(-1000..=1000)),
            rng.random_bool(0.1),
            bound,
            depth,
            Move::from_u16(rng.random_range(0..=u16::MAX)),
            Value::new(rng.random_range(-1000..=1000)),
            rng.random_bool(0.3),
            generation8,
        );
    }

    stats.probes.fetch_add(cli.probes, Ordering::Relaxed);
    stats.hits.fetch_add(hits, Ordering::Relaxed);
    stats.corrupt.fetch_add(corrupt, Ordering::Relaxed);
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let pool: ThreadPool = config.build_pool();
    let mut tt = config
        .build_table(&pool)
        .with_context(|| format!("failed to allocate {}MB table", config.hash_mb))?;
    log::info!(
        "TT ready: {}MB buckets={} large_pages={} params={:?}",
        config.hash_mb,
        tt.bucket_count(),
        tt.uses_large_pages(),
        tt.params()
    );

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(cli.seed);
    let hot: Vec<u64> = (0..cli.hot_keys).map(|_| rng.random::<u64>()).collect();

    println!("round  gen  probes      hit%   corrupt  hashfull  hashfull(all)  ms");
    for round in 0..cli.rounds {
        tt.new_search();
        let stats = RoundStats::default();
        let start = Instant::now();

        std::thread::scope(|s| {
            for tid in 0..config.threads {
                let seed = cli.seed ^ ((round as u64) << 32) ^ tid as u64;
                let (tt, cli, hot, stats) = (&tt, &cli, &hot[..], &stats);
                s.spawn(move || run_worker(tt, cli, hot, seed, stats));
            }
        });

        let elapsed = start.elapsed();
        let probes = stats.probes.load(Ordering::Relaxed);
        let hits = stats.hits.load(Ordering::Relaxed);
        let corrupt = stats.corrupt.load(Ordering::Relaxed);
        println!(
            "{:>5}  {:>3}  {:>10}  {:>5.1}  {:>7}  {:>8}  {:>13}  {:>4}",
            round + 1,
            tt.generation(),
            probes,
            hits as f64 * 100.0 / probes.max(1) as f64,
            corrupt,
            tt.hashfull(None),
            tt.hashfull(Some(u8::MAX >> 3)),
            elapsed.as_millis()
        );
        if corrupt > 0 {
            log::warn!("round {}: {corrupt} hits decoded out of range", round + 1);
        }
    }

    tt.clear(&pool);
    log::info!("TT cleared, hashfull={}", tt.hashfull(Some(u8::MAX >> 3)));
    Ok(())
}
