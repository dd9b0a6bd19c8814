//! ModelCache main entry point
//!
//! This is the command-line interface for the ModelCache crawler and its
//! control API server.

use clap::Parser;
use modelcache::browser::BrowserExecutor;
use modelcache::config::load_config_with_hash;
use modelcache::crawler::Scheduler;
use modelcache::server::{self, AppState};
use modelcache::sitemap::import_sitemap;
use modelcache::state::ItemState;
use modelcache::storage::{open_storage, WorkStore};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// ModelCache: a sitemap-driven page cache
///
/// ModelCache ingests a sitemap into a durable work queue, fetches each page
/// through a scripted browser at a configurable politeness budget, and serves
/// the extracted fields plus crawl controls over a local HTTP API.
#[derive(Parser, Debug)]
#[command(name = "modelcache")]
#[command(version = "1.0.0")]
#[command(about = "A sitemap-driven page cache", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ingest a sitemap XML file into the work queue and exit
    #[arg(long, value_name = "SITEMAP", conflicts_with = "stats")]
    import: Option<PathBuf>,

    /// Show work queue statistics and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(sitemap) = &cli.import {
        handle_import(&config, sitemap)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_serve(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("modelcache=info,warn"),
            1 => EnvFilter::new("modelcache=debug,info"),
            2 => EnvFilter::new("modelcache=trace,debug"),
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

/// Handles --import: ingests a sitemap into the work queue
fn handle_import(
    config: &modelcache::Config,
    sitemap: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = open_storage(Path::new(&config.storage.database_path))?;

    println!("Importing sitemap: {}", sitemap.display());
    let summary = import_sitemap(&mut store, sitemap)?;

    println!("  Entries parsed:  {}", summary.parsed);
    println!("  Valid URLs:      {}", summary.staged);
    println!("  Newly queued:    {}", summary.added);

    Ok(())
}

/// Handles --stats: prints per-status counts from the work store
fn handle_stats(config: &modelcache::Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_storage(Path::new(&config.storage.database_path))?;

    println!("Database: {}\n", config.storage.database_path);

    let progress = store.progress()?;
    println!("Total URLs: {}", progress.total);
    for status in ItemState::all_states() {
        let count = store.count_by_status(status)?;
        println!("  {:<12} {}", status.to_db_string(), count);
    }

    Ok(())
}

/// Handles the default mode: serves the control API with an idle scheduler
async fn handle_serve(config: modelcache::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = config.server.listen_addr.parse()?;

    let store = Arc::new(Mutex::new(open_storage(Path::new(
        &config.storage.database_path,
    ))?));

    let executor = Arc::new(BrowserExecutor::new(
        config.browser.clone(),
        config.crawler.navigation_timeout(),
    ));

    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        executor,
        config.crawler.scheduler_timing(),
    ));

    let state = AppState { store, scheduler };

    server::serve(addr, state).await?;

    Ok(())
}
