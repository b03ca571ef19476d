//! Apply a hand-reviewed review queue: write titles and record confirmed corrections.
//! Usage: apply-reviewed [--dry-run] [logs/review_queue.csv]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use setlist_tagger::config::Config;
use setlist_tagger::corrections::CorrectionsStore;
use setlist_tagger::review::{apply_reviewed, read_review_queue};
use setlist_tagger::safety::validate_output_path;
use setlist_tagger::tags::LoftyTags;

#[derive(Parser)]
#[command(name = "apply-reviewed")]
#[command(about = "Apply reviewed titles from the review queue")]
struct Args {
    /// Review queue CSV (defaults to the configured path)
    queue: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Corrections file to append confirmed titles to
    #[arg(long)]
    corrections: Option<PathBuf>,

    /// Show what would change without writing tags or corrections
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let queue = args.queue.unwrap_or_else(|| config.paths.review_queue.clone());
    let corrections_path = args
        .corrections
        .unwrap_or_else(|| config.paths.corrections.clone());
    validate_output_path(
        &corrections_path,
        &[queue.as_path(), config.paths.extra_songs.as_path(), config.paths.database.as_path()],
    )?;

    let entries = read_review_queue(&queue)
        .with_context(|| format!("Failed to read review queue {}", queue.display()))?;
    info!(entries = entries.len(), queue = %queue.display(), "Loaded review queue");

    let mut corrections = CorrectionsStore::load(&corrections_path)
        .context("Failed to load corrections")?;
    if args.dry_run {
        corrections = corrections.detached();
    }

    let summary = apply_reviewed(&entries, &mut LoftyTags, &mut corrections, args.dry_run);
    let flushed = corrections.flush().context("Failed to save corrections")?;

    println!("\n{:=<60}", "");
    println!(
        "{}",
        if args.dry_run { "Dry run complete" } else { "Review applied!" }
    );
    println!("  Applied: {}", summary.applied);
    println!("  Skipped: {}", summary.skipped);
    println!("  Missing files: {}", summary.missing);
    println!("  Write failures: {}", summary.failed);
    println!("  Corrections recorded: {}", flushed);
    println!("{:=<60}", "");

    Ok(())
}
