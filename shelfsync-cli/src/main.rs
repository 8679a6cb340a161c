use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use shelfsync::{sync_shelf, SyncConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_FEED_URL: &str = "https://standardreads.org/feeds/publications/all";

#[derive(Parser)]
#[command(name = "shelfsync")]
#[command(about = "Synchronize a remote publication catalog with a local collection")]
#[command(after_help = "\
Statuses reported for publications:

  N: new (found in the catalog but not found locally)
  U: update (newer revision found in the catalog)
  X: extraneous (local file was not found in the catalog)

An extraneous file can occur when the catalog changes the identifier of a
previously published title. It's a rare occurrence, and it's generally safe
to delete such files.")]
struct Cli {
    /// Directory where the local collection is stored
    #[arg(long, env = "SHELFSYNC_BOOKS")]
    books: PathBuf,

    /// Directory where new publications are downloaded
    #[arg(long, env = "SHELFSYNC_DOWNLOADS")]
    downloads: PathBuf,

    /// Account email used to authenticate with the catalog
    #[arg(long, env = "SHELFSYNC_EMAIL")]
    email: String,

    /// URL of the publication catalog feed
    #[arg(long, env = "SHELFSYNC_FEED", default_value = DEFAULT_FEED_URL)]
    feed: String,

    /// Perform a trial run with no changes made
    #[arg(long)]
    dry_run: bool,

    /// Suppress non-error messages
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Increase verbosity
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set; otherwise verbosity flags pick the level
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = SyncConfig {
        account: cli.email,
        feed_url: cli.feed,
        books_dir: cli.books,
        downloads_dir: cli.downloads,
        dry_run: cli.dry_run,
    };
    info!(feed = %config.feed_url, dry_run = config.dry_run, "starting sync");

    let report = sync_shelf(&config)
        .await
        .context("synchronization failed")?;

    if !cli.quiet {
        for line in &report.lines {
            println!("{} {}", line.status.marker(), line.path.display());
        }
    }
    for failure in &report.failures {
        eprintln!("failed: {}: {}", failure.description, failure.error);
    }
    if !cli.quiet {
        println!("{}", report.summary());
    }

    if !report.is_successful() {
        std::process::exit(1);
    }
    Ok(())
}
