//! EMWIN Parser CLI - Decode NWS text products into structured segments.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use emwin_parser::{
    config::{Config, OutputFormat},
    decoder::{Decoder, DecoderOptions},
    filter::ProductFilter,
    inbox::{Inbox, InboxConfig, InboxEvent, read_product},
    metrics::start_metrics_server,
    product::{ProductSegment, RawProduct},
    stats::DecodeStats,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// EMWIN Parser - Decode NWS text products into structured segments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Product files or directories to decode
    paths: Vec<PathBuf>,

    /// Watch a directory for incoming products instead of decoding PATHS
    #[arg(short, long, env = "EMWIN_WATCH_DIR")]
    watch: Option<PathBuf>,

    /// Config file (default: platform config dir)
    #[arg(short, long, env = "EMWIN_CONFIG")]
    config: Option<PathBuf>,

    /// Source identifier recorded on every product
    #[arg(long, env = "EMWIN_SOURCE")]
    source: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Drop malformed fields instead of failing the segment
    #[arg(long)]
    lenient: bool,

    /// Transmission timestamp (RFC 3339) instead of the file modification time
    #[arg(long)]
    timestamp: Option<DateTime<Utc>>,

    /// Print statistics every N seconds in watch mode (0 = never)
    #[arg(short, long)]
    stats_interval: Option<u64>,

    /// Print a statistics summary after decoding PATHS
    #[arg(long)]
    stats: bool,

    /// Serve Prometheus metrics in watch mode
    #[arg(long)]
    metrics: bool,

    /// Port for the Prometheus metrics endpoint
    #[arg(long, env = "EMWIN_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Everything needed to turn a raw product into printed output.
struct Pipeline {
    decoder: Decoder,
    filters: Vec<ProductFilter>,
    format: OutputFormat,
    stats: Arc<DecodeStats>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = match args.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    apply_args(&mut config, &args);
    config.validate()?;

    let pipeline = Pipeline {
        decoder: Decoder::new(DecoderOptions {
            strict: config.strict,
        }),
        filters: config.filters.clone(),
        format: config.format,
        stats: Arc::new(DecodeStats::new()),
    };

    match config.watch_dir.clone() {
        Some(dir) => run_watch(dir, &config, pipeline).await,
        None if args.paths.is_empty() => {
            anyhow::bail!("Nothing to decode: give product paths or --watch DIR")
        }
        None => {
            run_batch(&args.paths, &config, args.timestamp, &pipeline)?;
            if args.stats {
                eprintln!("{}", pipeline.stats.summary());
            }
            Ok(())
        }
    }
}

/// Let command-line flags override config file values.
fn apply_args(config: &mut Config, args: &Args) {
    if let Some(ref dir) = args.watch {
        config.watch_dir = Some(dir.clone());
    }
    if let Some(ref source) = args.source {
        config.source = source.clone();
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    if args.lenient {
        config.strict = false;
    }
    if let Some(interval) = args.stats_interval {
        config.stats_interval = interval;
    }
    if args.metrics {
        config.metrics_enabled = true;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }
}

/// Decode the given files, expanding directories one level deep.
fn run_batch(
    paths: &[PathBuf],
    config: &Config,
    timestamp: Option<DateTime<Utc>>,
    pipeline: &Pipeline,
) -> Result<()> {
    let inbox = InboxConfig {
        extensions: config.extensions.clone(),
        ..InboxConfig::new(PathBuf::new())
    };

    for path in paths {
        for file in expand_path(path, &inbox)? {
            match read_product(&file, &config.source, config.max_product_size, timestamp) {
                Ok(product) => {
                    for line in process_product(&product, pipeline) {
                        println!("{}", line);
                    }
                }
                Err(e) => error!("{:#}", e),
            }
        }
    }

    Ok(())
}

/// Files named by `path`: the path itself, or the accepted files of a
/// directory in name order.
fn expand_path(path: &Path, inbox: &InboxConfig) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("Failed to read {}", path.display()))?
    {
        let file = entry?.path();
        if file.is_file() && inbox.accepts(&file) {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

/// Poll the watch directory until Ctrl+C.
async fn run_watch(dir: PathBuf, config: &Config, pipeline: Pipeline) -> Result<()> {
    info!("EMWIN Parser starting...");
    info!("Source: {}", config.source);

    let stats = Arc::clone(&pipeline.stats);

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // Start stats printer
    if config.stats_interval > 0 {
        let stats_clone = Arc::clone(&stats);
        let stats_interval = config.stats_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                eprintln!("\n{}", stats_clone.summary());
            }
        });
    }

    // Start metrics server
    if config.metrics_enabled {
        let stats_clone = Arc::clone(&stats);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port, stats_clone).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let inbox = Inbox::new(InboxConfig {
        dir,
        poll_interval: Duration::from_secs(config.poll_interval),
        extensions: config.extensions.clone(),
        max_product_size: config.max_product_size,
        source: config.source.clone(),
    });
    let mut events = inbox.start();

    // Main event loop
    loop {
        tokio::select! {
            // Check for shutdown
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }

            // Process inbox events
            event = events.recv() => {
                match event {
                    Some(InboxEvent::Product(product)) => {
                        for line in process_product(&product, &pipeline) {
                            println!("{}", line);
                        }
                    }
                    Some(InboxEvent::Error(e)) => {
                        warn!("Inbox: {}", e);
                    }
                    None => {
                        // Channel closed
                        break;
                    }
                }
            }
        }
    }

    // Print final statistics
    eprintln!("\n\nFINAL STATISTICS");
    eprintln!("{}", stats.summary());

    Ok(())
}

/// Decode one product, record statistics and render the segments that pass
/// the filters.
fn process_product(product: &RawProduct, pipeline: &Pipeline) -> Vec<String> {
    let results = pipeline.decoder.decode(product);

    // Every bulletin starts with segment 1
    let bulletins = results
        .iter()
        .filter(|result| match result {
            Ok(segment) => segment.sequence == 1,
            Err(e) => e.sequence == 1,
        })
        .count();
    pipeline
        .stats
        .record_transmission(product.content.len() as u64, bulletins, results.len());

    if results.is_empty() {
        debug!("{}: no bulletins", product.filename);
    }

    let mut lines = Vec::new();
    for result in results {
        match result {
            Ok(segment) => {
                pipeline.stats.record_segment(&segment);
                if !select(&segment, pipeline) {
                    continue;
                }
                match render(&segment, pipeline.format) {
                    Ok(line) => lines.push(line),
                    Err(e) => error!("Failed to render {}: {}", segment.filename, e),
                }
            }
            Err(e) => {
                pipeline.stats.record_failure();
                warn!("{}: {}", e, e.source);
            }
        }
    }
    lines
}

/// Whether a segment passes the output filters, recording each match.
fn select(segment: &ProductSegment, pipeline: &Pipeline) -> bool {
    if pipeline.filters.is_empty() {
        return true;
    }

    let mut selected = false;
    for (i, filter) in pipeline.filters.iter().enumerate() {
        if filter.matches(segment) {
            pipeline.stats.record_filter_match(&filter.label(i));
            selected = true;
        }
    }
    selected
}

fn render(segment: &ProductSegment, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(segment)?),
        OutputFormat::Text => Ok(segment.to_string()),
    }
}
