//! parjoin - partitioned parallel hash join over delimited text relations

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use log::{debug, info};
use parjoin::datagen::{self, DatasetShape};
use parjoin::{
    config, BuildSide, FilterPredicate, HashJoinExecutor, JoinConfig, ScanMode, Side, Table,
};
use std::path::PathBuf;
use std::time::Instant;

/// parjoin - count `relation1 JOIN relation2 ON a = a` under a filter on `b`
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join two relation files and print the number of matching pairs
    Join(JoinArgs),
    /// Write a synthetic relation file
    Generate(GenerateArgs),
}

#[derive(clap::Args, Debug)]
struct JoinArgs {
    /// relation1 file
    left: PathBuf,

    /// relation2 file
    right: PathBuf,

    /// Number of worker partitions per stage
    #[arg(short, long, default_value_t = config::DEFAULT_PARTITIONS)]
    partitions: usize,

    /// Filter applied to every key-matched pair
    #[arg(long, value_enum, default_value = "left-greater")]
    predicate: PredicateArg,

    /// Relation to build the hash table from
    #[arg(long, value_enum, default_value = "auto")]
    build_side: BuildSideArg,

    /// How relations are read
    #[arg(long, value_enum, default_value = "partitioned")]
    scan: ScanArg,

    /// Capacity of each scanner's row stream
    #[arg(long, default_value_t = config::DEFAULT_ROW_CHANNEL_CAPACITY)]
    row_channel_capacity: usize,

    /// Capacity of each probe worker's match stream
    #[arg(long, default_value_t = config::DEFAULT_MATCH_CHANNEL_CAPACITY)]
    match_channel_capacity: usize,

    /// Bytes read per positional read while scanning
    #[arg(long, default_value_t = config::DEFAULT_READ_BLOCK_SIZE)]
    read_block_size: usize,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Output file
    out: PathBuf,

    /// Number of rows
    #[arg(long, default_value = "100000")]
    rows: usize,

    /// Keys are drawn from 0..KEYS
    #[arg(long, default_value = "20000")]
    keys: i64,

    /// Values are drawn from 0..=MAX_VALUE
    #[arg(long, default_value = "1000000")]
    max_value: i64,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PredicateArg {
    /// relation1.b > relation2.b
    LeftGreater,
    /// relation2.b > relation1.b
    RightGreater,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BuildSideArg {
    /// The smaller relation by byte size
    Auto,
    Left,
    Right,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScanArg {
    /// Record-aligned byte ranges read in parallel
    Partitioned,
    /// Read each relation into memory first
    Sequential,
}

impl From<PredicateArg> for FilterPredicate {
    fn from(arg: PredicateArg) -> Self {
        match arg {
            PredicateArg::LeftGreater => FilterPredicate::LeftGreater,
            PredicateArg::RightGreater => FilterPredicate::RightGreater,
        }
    }
}

impl From<BuildSideArg> for BuildSide {
    fn from(arg: BuildSideArg) -> Self {
        match arg {
            BuildSideArg::Auto => BuildSide::Auto,
            BuildSideArg::Left => BuildSide::Left,
            BuildSideArg::Right => BuildSide::Right,
        }
    }
}

impl From<ScanArg> for ScanMode {
    fn from(arg: ScanArg) -> Self {
        match arg {
            ScanArg::Partitioned => ScanMode::Partitioned,
            ScanArg::Sequential => ScanMode::Sequential,
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Join(join) => run_join(join),
        Command::Generate(generate) => run_generate(generate),
    }
}

fn run_join(args: JoinArgs) -> Result<()> {
    let config = JoinConfig::new()
        .with_partitions(args.partitions)
        .with_row_channel_capacity(args.row_channel_capacity)
        .with_match_channel_capacity(args.match_channel_capacity)
        .with_read_block_size(args.read_block_size)
        .with_build_side(args.build_side.into())
        .with_predicate(args.predicate.into())
        .with_scan_mode(args.scan.into());
    let executor = HashJoinExecutor::new(config).context("Invalid join configuration")?;
    debug!("Join configuration: {:?}", executor.config());

    let mut left = Table::open(Side::Left, &args.left)
        .with_context(|| format!("Failed to load {}", args.left.display()))?;
    let mut right = Table::open(Side::Right, &args.right)
        .with_context(|| format!("Failed to load {}", args.right.display()))?;

    let started = Instant::now();
    let outcome = executor
        .execute(&mut left, &mut right)
        .context("Join failed")?;
    info!(
        "Joined in {:?} (build {:?}, probe {:?}), partial counts {:?}",
        started.elapsed(),
        outcome.stats.build_elapsed,
        outcome.stats.probe_elapsed,
        outcome.stats.partial_counts
    );

    println!("{}", outcome.count);
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let shape = DatasetShape {
        rows: args.rows,
        keys: args.keys,
        max_value: args.max_value,
        seed: args.seed,
    };
    let rows = datagen::generate(&shape);
    datagen::write_rows(&args.out, &rows)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    info!("Wrote {} rows to {}", rows.len(), args.out.display());
    Ok(())
}
