mod config;

use anyhow::Result;
use beatmap_cache::{AccessOutcome, BeatmapCache, BeatmapCacheEntry, CacheStats};
use clap::{Args, Parser, Subcommand};
use config::{init_tracing, ConfigFile};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "beatmap-cache",
    version,
    about = "Inspect and maintain a disk-backed LFU beatmap cache"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML config file with `[cache]` and `[logging]` tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Cache directory (overrides config file and BEATMAP_CACHE_DIR)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Maximum total size of cached beatmaps, in bytes
    #[arg(long, global = true)]
    max_size: Option<u64>,
    /// Maximum number of cached beatmaps
    #[arg(long, global = true)]
    max_files: Option<usize>,
    /// Log level or EnvFilter directives (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Emit JSON suitable for scripts
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Record an access for each beatmap id, evicting as needed
    Access(AccessArgs),
    /// Show cache location, usage and limits
    Status,
    /// List cached beatmaps, next eviction victim first
    List(ListArgs),
    /// Evict until the configured limits hold, without recording an access
    Trim,
}

#[derive(Args)]
struct AccessArgs {
    /// Beatmap ids, in access order
    #[arg(required = true)]
    ids: Vec<u64>,
}

#[derive(Args)]
struct ListArgs {
    /// Only show the first N entries
    #[arg(long)]
    limit: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn load_config(args: &GlobalArgs) -> Result<ConfigFile> {
    let mut config = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    config.cache.apply_env()?;

    if let Some(dir) = &args.dir {
        config.cache.cache_dir = dir.clone();
    }
    if let Some(max_size) = args.max_size {
        config.cache.max_size_bytes = max_size;
    }
    if let Some(max_files) = args.max_files {
        config.cache.max_files = max_files;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli.global)?;
    init_tracing(&config.logging);
    let json = cli.global.json;

    let mut cache = BeatmapCache::open(config.cache)?;
    tracing::debug!(
        cache_dir = %cache.cache_dir().display(),
        entries = cache.len(),
        "opened beatmap cache"
    );

    match cli.command {
        Command::Access(args) => {
            let mut outcomes = Vec::with_capacity(args.ids.len());
            let mut failed = 0usize;
            for id in args.ids {
                match cache.access_beatmap(id) {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => {
                        failed += 1;
                        eprintln!("beatmap {id}: {:#}", anyhow::Error::new(err));
                    }
                }
            }
            print_access(&outcomes, json)?;
            if failed > 0 {
                return Ok(1);
            }
        }
        Command::Status => {
            print_status(&cache.stats(), json)?;
        }
        Command::List(args) => {
            let mut entries = cache.eviction_candidates();
            if let Some(limit) = args.limit {
                entries.truncate(limit);
            }
            print_entries(&entries, json)?;
        }
        Command::Trim => {
            let evicted = cache.enforce_limits()?;
            if json {
                print_json(&TrimReport {
                    evicted,
                    stats: cache.stats(),
                })?;
            } else {
                println!("evicted: {}", format_ids(&evicted));
                println!("entries: {}", cache.len());
                println!("total_bytes: {}", cache.total_bytes());
            }
        }
    }
    Ok(0)
}

#[derive(Serialize)]
struct TrimReport {
    evicted: Vec<u64>,
    stats: CacheStats,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn print_access(outcomes: &[AccessOutcome], json: bool) -> Result<()> {
    if json {
        return print_json(&outcomes);
    }

    for outcome in outcomes {
        println!(
            "{}: access_count={} last_accessed={} evicted={}",
            outcome.entry.beatmap_id,
            outcome.entry.access_count,
            outcome.entry.last_accessed,
            format_ids(&outcome.evicted)
        );
    }
    Ok(())
}

fn print_status(stats: &CacheStats, json: bool) -> Result<()> {
    if json {
        return print_json(stats);
    }

    println!("cache:");
    println!("  dir: {}", stats.cache_dir.display());
    println!("  entries: {} / {}", stats.entries, stats.max_files);
    println!(
        "  total_bytes: {} / {}",
        stats.total_bytes, stats.max_size_bytes
    );
    Ok(())
}

fn print_entries(entries: &[BeatmapCacheEntry], json: bool) -> Result<()> {
    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("cache: empty");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}\taccess_count={}\tlast_accessed={}",
            entry.beatmap_id, entry.access_count, entry.last_accessed
        );
    }
    Ok(())
}

fn format_ids(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "-".to_owned();
    }
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
