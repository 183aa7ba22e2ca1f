//! Docket main entry point
//!
//! This is the command-line interface for the Docket crawl engine.

use anyhow::{bail, Context};
use clap::Parser;
use docket::config::{load_config_with_hash, Config, SourceConfig};
use docket::crawler::Orchestrator;
use docket::output::{load_statistics, print_cycle_stats, print_statistics, CycleStats};
use docket::storage::open_storage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Docket: an incremental crawl and document-versioning engine
///
/// Docket re-crawls slow-changing listing sites, detects which listing pages
/// changed, and folds every document it finds into a deduplicated corpus
/// with per-document version lineage.
#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(version = "1.0.0")]
#[command(about = "An incremental crawl and document-versioning engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Only crawl the named source (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Walk every listing page from the seed, ignoring the stored frontier
    #[arg(long)]
    full: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what each source would do without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show corpus statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = select_sources(&config, &cli.sources, cli.full)?;

    if cli.dry_run {
        handle_dry_run(&config, &config_hash, &sources)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config, &config_hash, sources).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docket=info,warn"),
            1 => EnvFilter::new("docket=debug,info"),
            2 => EnvFilter::new("docket=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves `--source` selections against the config and applies `--full`
fn select_sources(
    config: &Config,
    names: &[String],
    full: bool,
) -> anyhow::Result<Vec<SourceConfig>> {
    let mut selected = Vec::new();
    if names.is_empty() {
        selected.extend(config.sources.iter().cloned());
    } else {
        for name in names {
            match config.source(name) {
                Some(source) => selected.push(source.clone()),
                None => bail!("Unknown source '{}'", name),
            }
        }
    }

    if selected.is_empty() {
        bail!("No sources configured");
    }

    if full {
        for source in &mut selected {
            source.force_full_scan = true;
        }
    }
    Ok(selected)
}

/// Handles the --dry-run mode: shows the plan each source would run with
fn handle_dry_run(
    config: &Config,
    config_hash: &str,
    sources: &[SourceConfig],
) -> anyhow::Result<()> {
    println!("=== Docket Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Window size: {}", config.crawler.window_size);
    println!("  Max pages per cycle: {}", config.crawler.max_pages);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Max next pages: {}", config.crawler.max_next_pages);
    println!(
        "  Retries: {} attempts, {}-{}ms backoff",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    );
    println!("  Client identities: {}", config.user_agent.identities.len());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let orchestrator = Orchestrator::new(storage, config, config_hash)?;

    println!("\nSources ({}):", sources.len());
    for source in sources {
        let plan = orchestrator.plan_cycle(source)?;
        println!("  - {} [{}] {}", source.name, source.source_type, source.seed_url);
        println!(
            "    mode: {}, window: {}, budget: {} pages",
            plan.mode, plan.window_size, plan.max_pages
        );
        if let Some((url, depth)) = &plan.frontier {
            println!("    frontier: {} (depth {})", url, depth);
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl: one task per source, each with its own connection
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    sources: Vec<SourceConfig>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current item");
            ctrl_c_token.cancel();
        }
    });

    tracing::info!("Crawling {} source(s)", sources.len());

    let mut handles = Vec::new();
    for source in sources {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let mut orchestrator =
            Orchestrator::new(storage, config, config_hash)?.with_cancellation(cancel.clone());

        handles.push(tokio::spawn(async move {
            orchestrator.run_crawl_cycle(&source).await
        }));
    }

    let mut results: Vec<CycleStats> = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(stats) => results.push(stats),
            Err(e) => tracing::error!("Crawl task failed: {}", e),
        }
    }

    for stats in &results {
        print_cycle_stats(stats);
    }

    let errors: usize = results.iter().map(|s| s.errors.len()).sum();
    tracing::info!(
        sources = results.len(),
        errors,
        cancelled = cancel.is_cancelled(),
        "Crawl finished"
    );

    Ok(())
}
