// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Command-line entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use milvus_bench::client::Connector;
use milvus_bench::client::rest::RestConnector;
use milvus_bench::dataset::{QuerySet, VectorDataset};
use milvus_bench::harness::BenchmarkOrchestrator;
use milvus_bench::{BenchConfig, BenchResult, setup};

#[derive(Parser)]
#[command(
    name = "milvus-bench",
    about = "Concurrent search/insert benchmark for a Milvus cluster with the SPACEV1B dataset",
    version
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the benchmark phases against a loaded collection
    Run(RunArgs),
    /// Bulk load base vectors into the collection
    Load(LoadArgs),
    /// Create the collection and its index
    Setup(SetupArgs),
}

#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    /// Milvus host
    #[arg(long, default_value = "node1")]
    host: String,

    /// Milvus port
    #[arg(long, default_value_t = 19530)]
    port: u16,

    /// Collection name
    #[arg(long, default_value = "spacev1b")]
    collection: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// Query vectors file
    #[arg(long, default_value = "data/spacev1b_queries.bin")]
    queries: PathBuf,

    /// Ground truth file for recall evaluation
    #[arg(long)]
    truth: Option<PathBuf>,

    /// Base vector file or shard directory for the insert workers
    #[arg(long)]
    vectors: Option<PathBuf>,

    /// Vector dimensionality
    #[arg(long, default_value_t = 100)]
    dim: usize,

    /// Neighbors requested per search
    #[arg(long, default_value_t = 100)]
    top_k: usize,

    /// search_list parameter forwarded to the server
    #[arg(long, default_value_t = 100)]
    search_list: u32,

    /// Search-only phase duration in seconds
    #[arg(long, default_value_t = 60)]
    search_duration: u64,

    /// Concurrent phase duration in seconds
    #[arg(long, default_value_t = 60)]
    concurrent_duration: u64,

    /// Concurrent search threads
    #[arg(long, default_value_t = 2)]
    search_workers: usize,

    /// Concurrent insert threads
    #[arg(long, default_value_t = 1)]
    insert_workers: usize,

    /// Vectors per insert request
    #[arg(long, default_value_t = 10_000)]
    batch_size: usize,

    /// Target insert rate in vectors/s across all workers (0 = unthrottled)
    #[arg(long, default_value_t = 0.0)]
    insert_rate: f64,

    /// Vectors already in the collection; inserts start above this id
    #[arg(long, default_value_t = 0)]
    initial_count: usize,

    /// Directory for the JSON report
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    /// Progress report interval in seconds
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Grace period for workers to stop, in seconds
    #[arg(long, default_value_t = 5)]
    join_timeout: u64,

    /// Decode the vector dataset into memory up front
    #[arg(long)]
    in_memory: bool,

    /// Skip the recall evaluation pass
    #[arg(long)]
    skip_recall: bool,
}

#[derive(clap::Args, Debug)]
struct LoadArgs {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// Base vector file or shard directory
    #[arg(long)]
    vectors: PathBuf,

    /// Vector dimensionality
    #[arg(long, default_value_t = 100)]
    dim: usize,

    /// Parallel insert workers
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Vectors per insert request
    #[arg(long, default_value_t = 10_000)]
    batch_size: usize,

    /// Target insert rate in vectors/s across all workers (0 = unthrottled)
    #[arg(long, default_value_t = 0.0)]
    insert_rate: f64,

    /// Flush after every n batches per worker (0 = only at the end)
    #[arg(long, default_value_t = 10)]
    flush_every: u32,

    /// Skip vectors below this global index (resume a partial load)
    #[arg(long, default_value_t = 0)]
    initial_count: usize,

    /// IVF nlist for the index built after loading
    #[arg(long, default_value_t = 4096)]
    nlist: u32,

    /// Drop and recreate the collection before loading
    #[arg(long = "drop")]
    drop_existing: bool,

    /// Create the vector index and load the collection afterwards
    #[arg(long, overrides_with = "no_index")]
    index: bool,

    /// Leave the collection unindexed and unloaded after the load
    #[arg(long)]
    no_index: bool,

    /// Decode the vector dataset into memory up front
    #[arg(long)]
    in_memory: bool,
}

#[derive(clap::Args, Debug)]
struct SetupArgs {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// Vector dimensionality
    #[arg(long, default_value_t = 100)]
    dim: usize,

    /// IVF nlist
    #[arg(long, default_value_t = 4096)]
    nlist: u32,

    /// Distance metric
    #[arg(long, default_value = "L2")]
    metric: String,

    /// Drop an existing collection first
    #[arg(long = "drop")]
    drop_existing: bool,
}

fn main() -> BenchResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    print_banner();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Load(args) => cmd_load(args),
        Command::Setup(args) => cmd_setup(args),
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_banner() {
    let title = format!("milvus-bench {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("{}", "╔══════════════════════════════════════╗".cyan());
    println!("{}", format!("║ {title:^36} ║").cyan());
    println!("{}", "╚══════════════════════════════════════╝".cyan());
    println!();
}

fn cmd_run(args: RunArgs) -> BenchResult<()> {
    let mut config = BenchConfig {
        host: args.conn.host,
        port: args.conn.port,
        collection: args.conn.collection,
        dim: args.dim,
        top_k: args.top_k,
        search_list: args.search_list,
        batch_size: args.batch_size,
        search_workers: args.search_workers,
        insert_workers: args.insert_workers,
        search_duration_s: args.search_duration,
        concurrent_duration_s: args.concurrent_duration,
        target_insert_rate: args.insert_rate,
        initial_count: args.initial_count,
        flush_every: 0,
        poll_interval_s: args.poll_interval,
        join_timeout_s: args.join_timeout,
        request_timeout_s: args.conn.request_timeout,
        skip_recall: args.skip_recall,
        in_memory: args.in_memory,
        vectors_path: args.vectors,
        queries_path: args.queries,
        truth_path: args.truth,
        output_dir: args.output_dir,
        ..BenchConfig::default()
    };
    if config.vectors_path.is_none() && config.insert_workers > 0 {
        info!("no --vectors given, the concurrent phase runs without insert workers");
        config.insert_workers = 0;
    }
    config.validate()?;

    println!(
        "target {}  collection {}",
        config.base_url().bold(),
        config.collection.bold()
    );

    info!("loading queries from {}", config.queries_path.display());
    let queries = QuerySet::load(&config.queries_path, config.truth_path.as_deref())?;
    info!(
        "{} queries (dim {}), ground truth: {}",
        queries.len(),
        queries.dim,
        if queries.has_truth() {
            format!("top-{}", queries.truth_k)
        } else {
            "none".to_string()
        }
    );

    let dataset = match &config.vectors_path {
        Some(path) => {
            let ds = VectorDataset::open(path)?;
            info!(
                "vector dataset: {} vectors (dim {}) from {}",
                ds.total_vectors(),
                ds.dimension(),
                path.display()
            );
            Some(ds)
        }
        None => None,
    };

    let connector = Arc::new(RestConnector::new(
        &config.host,
        config.port,
        config.request_timeout(),
    ));
    let output_dir = config.output_dir.clone();
    let mut orchestrator = BenchmarkOrchestrator::new(config, connector, queries, dataset);
    let report = orchestrator.run()?;

    report.print_summary();
    let path = report.save(&output_dir)?;
    println!();
    println!("report written to {}", path.display().to_string().green());
    Ok(())
}

fn cmd_load(args: LoadArgs) -> BenchResult<()> {
    let build_index = args.index || !args.no_index;
    let config = BenchConfig {
        host: args.conn.host,
        port: args.conn.port,
        collection: args.conn.collection,
        dim: args.dim,
        nlist: args.nlist,
        batch_size: args.batch_size,
        insert_workers: args.workers,
        target_insert_rate: args.insert_rate,
        initial_count: args.initial_count,
        flush_every: args.flush_every,
        request_timeout_s: args.conn.request_timeout,
        in_memory: args.in_memory,
        vectors_path: Some(args.vectors.clone()),
        ..BenchConfig::default()
    };

    let dataset = VectorDataset::open(&args.vectors)?;
    info!(
        "vector dataset: {} vectors (dim {}) from {}",
        dataset.total_vectors(),
        dataset.dimension(),
        args.vectors.display()
    );

    let connector = Arc::new(RestConnector::new(
        &config.host,
        config.port,
        config.request_timeout(),
    ));
    let mut admin = connector.connect()?;
    setup::ensure_collection(admin.as_mut(), &config, args.drop_existing)?;

    let mut orchestrator = BenchmarkOrchestrator::new(
        config.clone(),
        connector,
        QuerySet::empty(config.dim),
        Some(dataset),
    );
    let summary = orchestrator.bulk_load()?;
    println!(
        "loaded {} vectors at {:.1}/s ({} errors)",
        summary.vectors_inserted, summary.actual_insert_rate, summary.insert_errors
    );

    if build_index {
        setup::ensure_index(admin.as_mut(), &config)?;
        setup::load_and_wait(admin.as_mut(), &config.collection)?;
        println!("{}", format!("collection {} indexed and loaded", config.collection).green());
    }
    Ok(())
}

fn cmd_setup(args: SetupArgs) -> BenchResult<()> {
    let config = BenchConfig {
        host: args.conn.host,
        port: args.conn.port,
        collection: args.conn.collection,
        dim: args.dim,
        nlist: args.nlist,
        metric: args.metric,
        request_timeout_s: args.conn.request_timeout,
        ..BenchConfig::default()
    };

    let connector = RestConnector::new(&config.host, config.port, config.request_timeout());
    let mut client = connector.connect()?;
    setup::ensure_collection(client.as_mut(), &config, args.drop_existing)?;
    setup::ensure_index(client.as_mut(), &config)?;
    println!(
        "{}",
        format!(
            "collection {} ready (dim {}, {} nlist {})",
            config.collection, config.dim, config.metric, config.nlist
        )
        .green()
    );
    Ok(())
}
