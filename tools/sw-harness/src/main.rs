//! Command-line harness for the Folio service worker.
//!
//! Each invocation builds a worker for the configured site, replays one
//! lifecycle event against the live origin and writes the cache buckets back
//! to the cache directory.
//!
//! ## Usage
//!
//! ```bash
//! # Seed the current bucket from the asset manifest
//! sw-harness install
//!
//! # Seed and promote the current version, purging stale buckets
//! sw-harness activate
//!
//! # Fetch a path through the worker
//! sw-harness fetch /index.html
//!
//! # Simulate a push and click its "explore" action
//! sw-harness push --text "New project" --click explore
//!
//! # Everything at once
//! sw-harness --config site.json -vv run
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use folio_common::{init_logging, LogConfig, LogFormat};
use folio_core::SiteConfig;
use folio_net::{LoaderConfig, Request, ResourceLoader};
use folio_sw::{
    AssetCacheManager, CacheStorage, InstallOutcome, PushMessageData, Registration, WorkerConfig,
    WorkerScope,
};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "sw-harness")]
#[command(about = "Drive the Folio service worker's lifecycle events")]
struct Cli {
    /// Site configuration file (JSON); defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the site origin
    #[arg(long)]
    origin: Option<String>,

    /// Override the directory cache buckets are persisted to
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the current version into the waiting slot
    Install,

    /// Install and activate the current version, deleting stale buckets
    Activate,

    /// Fetch a root-relative path through the worker
    Fetch {
        /// Path to request, e.g. /index.html
        path: String,
        /// Print the response body
        #[arg(long)]
        body: bool,
    },

    /// Deliver a push event
    Push {
        /// Push payload text
        #[arg(long)]
        text: Option<String>,
        /// Click the shown notification with this action
        #[arg(long)]
        click: Option<String>,
    },

    /// Fire a background sync event
    Sync {
        /// Sync tag
        tag: String,
    },

    /// Show cache buckets and their entries
    Status,

    /// Install, activate, then fetch every manifest asset
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format));

    let mut site = SiteConfig::load_or_default(cli.config.as_deref())
        .context("failed to load site configuration")?;
    if let Some(origin) = cli.origin {
        site.origin = origin;
    }
    if let Some(dir) = cli.cache_dir {
        site.cache_dir = dir;
    }
    let scope = open_scope(&site)?;

    execute(cli.command, &site, &scope).await?;

    scope
        .caches
        .read()
        .await
        .save(&site.cache_dir)
        .context("failed to persist cache buckets")?;

    Ok(())
}

/// Run one command against `scope`. Buckets are not persisted here.
async fn execute(command: Commands, site: &SiteConfig, scope: &WorkerScope) -> Result<()> {
    let worker_config = WorkerConfig::from_site(site)?;

    match command {
        Commands::Install => {
            let mut registration = Registration::new(scope.clone());
            let outcome = registration.update(worker_config).await?;
            report_install(&outcome);
        }

        Commands::Activate => {
            let mut registration = Registration::new(scope.clone());
            let (outcome, deleted) = registration.install_and_activate(worker_config).await?;
            report_install(&outcome);
            println!("Active bucket: {}", site.cache_name());
            for name in deleted {
                println!("  deleted {name}");
            }
        }

        Commands::Fetch { path, body } => {
            let worker = AssetCacheManager::new(worker_config, scope.clone());
            let url = site.origin_url()?.join(&path)?;
            let response = worker.handle_fetch(Request::get(url)).await?;

            println!("{} {}", response.status, response.url);
            println!("  type:       {:?}", response.response_type);
            println!("  from cache: {}", response.from_cache);
            println!("  bytes:      {}", response.body_len());
            if body {
                println!();
                println!("{}", response.text()?);
            }
        }

        Commands::Push { text, click } => {
            let worker = AssetCacheManager::new(worker_config, scope.clone());
            let data = text.as_deref().map(PushMessageData::from);
            println!(
                "{}",
                serde_json::to_string_pretty(&worker.notification_options(data.as_ref()))?
            );

            let Some(id) = worker.handle_push(data).await? else {
                bail!("notification was not shown");
            };
            println!("Shown notification {id}");

            if let Some(action) = click {
                let outcome = worker
                    .handle_notification_click(id, Some(action.as_str()))
                    .await?;
                println!("  closed: {}", outcome.closed);
                if let Some(client) = outcome.opened {
                    println!("  opened: {}", client.url);
                }
            }
        }

        Commands::Sync { tag } => {
            let worker = AssetCacheManager::new(worker_config, scope.clone());
            let recognized = worker.handle_sync(&tag).await?;
            println!("Sync '{tag}': {}", if recognized { "acknowledged" } else { "ignored" });
        }

        Commands::Status => {
            print_status(site, scope).await;
        }

        Commands::Run => {
            let mut registration = Registration::new(scope.clone());
            let (outcome, deleted) = registration
                .install_and_activate(worker_config.clone())
                .await?;
            report_install(&outcome);
            debug!(?deleted, "Stale buckets removed");

            let mut misses = 0;
            for url in worker_config.asset_urls()? {
                let response = registration.handle_fetch(Request::get(url)).await?;
                if !response.from_cache {
                    misses += 1;
                }
                println!(
                    "{:>5} {:<6} {}",
                    response.status.as_u16(),
                    if response.from_cache { "cache" } else { "net" },
                    response.url
                );
            }
            info!(misses, "Run finished");
            print_status(site, scope).await;
        }
    }

    Ok(())
}

/// Build the host scope: persisted buckets plus an HTTP loader bound to the
/// site origin.
fn open_scope(site: &SiteConfig) -> Result<WorkerScope> {
    let loader_config = LoaderConfig {
        user_agent: site.user_agent.clone(),
        ..LoaderConfig::default()
    }
    .with_origin(site.origin_url()?);
    let loader = ResourceLoader::new(loader_config)?;

    let storage = CacheStorage::load(&site.cache_dir)?;
    Ok(WorkerScope::new(Arc::new(loader)).with_caches(storage))
}

fn report_install(outcome: &InstallOutcome) {
    match outcome {
        InstallOutcome::Complete { cached } => println!("Installed: {cached} assets cached"),
        InstallOutcome::Degraded { reason } => println!("Installed (degraded): {reason}"),
    }
}

async fn print_status(site: &SiteConfig, scope: &WorkerScope) {
    let caches = scope.caches.read().await;
    let current = site.cache_name();

    println!("Cache directory: {}", site.cache_dir.display());
    for name in caches.keys() {
        let marker = if name == current { "*" } else { " " };
        let count = caches.get(name).map_or(0, |cache| cache.len());
        println!("{marker} {name} ({count} entries)");
    }
}
