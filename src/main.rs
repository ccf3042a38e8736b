//! shelfsync - third-party game libraries to Steam shortcuts

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use shelfsync::config::SyncConfig;
use shelfsync::identity::{extract_identity, Store};
use shelfsync::pipeline::SyncPipeline;
use shelfsync::progress::SyncTracker;
use shelfsync::registry::RegistryIndex;
use shelfsync::service::SyncService;
use shelfsync::shortcuts::ShortcutsStore;

#[derive(Parser)]
#[command(name = "shelfsync")]
#[command(version)]
#[command(about = "Syncs Epic/GOG/Amazon game libraries into the Steam shortcuts registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct PathArgs {
    /// Path to the shortcuts container (default: auto-detected Steam userdata)
    #[arg(long)]
    shortcuts: Option<PathBuf>,

    /// Path to the registry index file
    #[arg(long)]
    index: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one foreground sync
    Sync {
        #[command(flatten)]
        paths: PathArgs,

        /// Parallel artwork fetches
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Run the background sync service until interrupted
    Daemon {
        #[command(flatten)]
        paths: PathArgs,

        /// Seconds between syncs
        #[arg(long, default_value_t = 300)]
        interval: u64,
    },

    /// Show container and registry statistics
    Status {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// List all shortcut records
    List {
        #[command(flatten)]
        paths: PathArgs,
    },
}

fn build_config(paths: &PathArgs) -> Result<SyncConfig> {
    let mut config = SyncConfig::discover().context("discovering Steam paths")?;
    if let Some(shortcuts) = &paths.shortcuts {
        config.shortcuts_path = shortcuts.clone();
    }
    if let Some(index) = &paths.index {
        config.registry_path = index.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync { paths, concurrency } => {
            let mut config = build_config(&paths)?;
            config.artwork_concurrency = concurrency;
            config.validate()?;
            run_foreground_sync(config).await
        }
        Commands::Daemon { paths, interval } => {
            let mut config = build_config(&paths)?;
            config.interval = Duration::from_secs(interval);
            config.validate()?;
            run_daemon(config).await
        }
        Commands::Status { paths } => {
            let config = build_config(&paths)?;
            print_status(&config)
        }
        Commands::List { paths } => {
            let config = build_config(&paths)?;
            list_shortcuts(&config)
        }
    }
}

async fn run_foreground_sync(config: SyncConfig) -> Result<()> {
    let tracker = SyncTracker::new();
    let pipeline = Arc::new(SyncPipeline::new(config, tracker.clone()));

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .expect("valid progress template"),
    );

    let poller = {
        let tracker = tracker.clone();
        let bar = bar.clone();
        tokio::spawn(async move {
            loop {
                let snap = tracker.snapshot();
                bar.set_position(snap.progress_percent as u64);
                bar.set_message(format!(
                    "{} {}",
                    snap.current_phase.as_str(),
                    snap.current_game.label
                ));
                if snap.current_phase.is_terminal() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
    };

    let (_keep, cancel) = watch::channel(false);
    let result = pipeline.run(&cancel).await;
    let _ = poller.await;
    bar.finish_and_clear();

    let report = result?;
    println!(
        "Synced {} games: {} added, {} updated, {} removed, {} unchanged{}",
        report.total_games,
        report.merge.added,
        report.merge.updated,
        report.merge.removed,
        report.merge.unchanged,
        if report.merge.wrote {
            ""
        } else {
            " (container already up to date)"
        }
    );
    for store in &report.failed_stores {
        warn!("{store} could not be enumerated this run");
    }
    Ok(())
}

async fn run_daemon(config: SyncConfig) -> Result<()> {
    let interval = config.interval;
    let pipeline = SyncPipeline::new(config, SyncTracker::new());
    let service = Arc::new(SyncService::new(pipeline, interval));

    let runner = {
        let service = service.clone();
        tokio::spawn(async move { service.run().await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    println!("Stopping after the current unit of work...");
    service.stop();
    runner.await.context("service task panicked")??;
    Ok(())
}

fn print_status(config: &SyncConfig) -> Result<()> {
    let store = ShortcutsStore::new(&config.shortcuts_path);
    let map = store.load()?;
    let registry = RegistryIndex::load(&config.registry_path);

    let mut per_store = Vec::new();
    for store_tag in Store::ALL {
        let count = map
            .values()
            .filter(|s| {
                s.launch_options()
                    .and_then(extract_identity)
                    .is_some_and(|id| id.store == store_tag)
            })
            .count();
        per_store.push(format!("{store_tag}: {count}"));
    }
    let foreign = map
        .values()
        .filter(|s| s.launch_options().map_or(true, |o| extract_identity(o).is_none()))
        .count();

    println!("Shortcuts container: {}", config.shortcuts_path.display());
    println!("  {} records ({})", map.len(), per_store.join(", "));
    println!("  {foreign} foreign records");
    println!("Registry index: {}", config.registry_path.display());
    println!("  {} entries", registry.len());
    if let Some(last) = registry.entries().iter().map(|e| e.last_synced).max() {
        println!("  last synced {last}");
    }
    Ok(())
}

fn list_shortcuts(config: &SyncConfig) -> Result<()> {
    let map = ShortcutsStore::new(&config.shortcuts_path).load()?;
    if map.is_empty() {
        println!("No shortcuts");
        return Ok(());
    }
    for (slot, record) in &map {
        let owner = record
            .launch_options()
            .and_then(extract_identity)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "foreign".to_string());
        println!(
            "{slot:>5}  {:<40} {:<10} {}",
            record.app_name().unwrap_or("?"),
            owner,
            record.exe().unwrap_or("?")
        );
    }
    Ok(())
}
