//! Tag live show recordings with canonical song titles and disc/track numbers.
//!
//! Usage: setlist-tagger [--trust-text] [--trial] <shows_root>

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use setlist_tagger::config::Config;
use setlist_tagger::corrections::{CorrectionsStore, ExtraLabels};
use setlist_tagger::matcher::SongMatcher;
use setlist_tagger::models::RunStats;
use setlist_tagger::pipeline::Pipeline;
use setlist_tagger::progress::{create_spinner, format_duration, set_log_only};
use setlist_tagger::reference::JerryBase;
use setlist_tagger::safety::validate_output_path;
use setlist_tagger::tags::LoftyTags;

#[derive(Parser)]
#[command(name = "setlist-tagger")]
#[command(about = "Reconcile show folders with their setlists and tag titles, discs and tracks")]
struct Args {
    /// Show folder, or a directory holding show folders
    root: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference database (JerryBase SQLite)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Setlist text file wins over existing tags; mismatched folders are skipped
    #[arg(long)]
    trust_text: bool,

    /// Resolve and assign everything without writing tags
    #[arg(long)]
    trial: bool,

    /// Only process `root` itself
    #[arg(long)]
    no_recursive: bool,

    #[arg(long)]
    auto_apply: Option<u8>,

    #[arg(long)]
    review: Option<u8>,

    /// Act flag for the reference lookup (1 = Grateful Dead, 0 = other acts)
    #[arg(long)]
    gd: Option<i64>,

    /// Write run statistics as JSON
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Hide progress bars, print periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(db) = &args.db {
        config.paths.database = db.clone();
    }
    if let Some(value) = args.auto_apply {
        config.thresholds.auto_apply = value;
    }
    if let Some(value) = args.review {
        config.thresholds.review = value;
    }
    if let Some(gd) = args.gd {
        config.run.gd = gd;
    }
    config.run.trust_text |= args.trust_text;
    config.run.dry_run |= args.trial;
    if args.no_recursive {
        config.run.recursive = false;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Reports must never land on the mapping files or the database.
fn check_output_paths(config: &Config, stats_json: Option<&Path>) -> Result<()> {
    let paths = &config.paths;
    let protected = [
        paths.corrections.as_path(),
        paths.extra_songs.as_path(),
        paths.database.as_path(),
    ];
    let unmatched = paths.unmatched_report();
    let segue = paths.segue_report();
    let discrepancies = paths.discrepancy_report();
    let mut outputs = vec![
        paths.review_queue.as_path(),
        unmatched.as_path(),
        segue.as_path(),
        discrepancies.as_path(),
    ];
    outputs.extend(stats_json);
    for output in outputs {
        validate_output_path(output, &protected)?;
    }
    Ok(())
}

fn print_summary(stats: &RunStats, trial: bool) {
    println!("\n{:=<60}", "");
    println!("{}", if trial { "Trial run complete" } else { "Tagging complete!" });
    println!(
        "  Folders: {} seen, {} processed, {} skipped, {} failed",
        stats.folders_seen, stats.folders_processed, stats.folders_skipped, stats.folders_failed
    );
    println!(
        "  Files: {} (tag {}, tag low-confidence {}, text {}, reference {}, no mapping {}, unmatched {})",
        stats.files_seen,
        stats.from_existing_tag,
        stats.from_existing_tag_low_confidence,
        stats.from_text_file,
        stats.from_reference_position,
        stats.no_text_mapping,
        stats.unmatched
    );
    println!(
        "  Review: {}  Duplicates: {}  Segue discrepancies: {}  Setlist discrepancies: {}",
        stats.needs_review,
        stats.duplicate_warnings,
        stats.segue_discrepancies,
        stats.setlist_discrepancies
    );
    println!(
        "  Written: {}  Write failures: {}  Read failures: {}  Corrections learned: {}",
        stats.files_written,
        stats.write_failures,
        stats.read_failures,
        stats.corrections_learned
    );
    println!(
        "  Elapsed: {}",
        format_duration(Duration::from_secs_f64(stats.elapsed_seconds))
    );
    println!("{:=<60}", "");
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    check_output_paths(&config, args.stats_json.as_deref())?;

    let spinner = create_spinner("Loading reference database...");
    let db = JerryBase::open(&config.paths.database).context("Failed to open reference database")?;
    let titles = db.canonical_titles().context("Failed to load song titles")?;
    let extras = ExtraLabels::load(&config.paths.extra_songs)
        .context("Failed to load extra song labels")?;
    let mut corrections = CorrectionsStore::load(&config.paths.corrections)
        .context("Failed to load corrections")?;
    if config.run.dry_run {
        corrections = corrections.detached();
    }
    spinner.finish_and_clear();

    let matcher = SongMatcher::new(titles, extras, config.thresholds);
    info!(
        songs = matcher.vocabulary_len(),
        corrections = corrections.len(),
        trust_text = config.run.trust_text,
        trial = config.run.dry_run,
        "Loaded vocabulary"
    );

    let trial = config.run.dry_run;
    let mut pipeline = Pipeline::new(config, matcher, db, LoftyTags, corrections);
    let stats = pipeline
        .run(&args.root)
        .with_context(|| format!("Failed to process {}", args.root.display()))?
        .clone();

    print_summary(&stats, trial);
    if args.log_only {
        stats.log_phase("final");
    }
    if let Some(path) = &args.stats_json {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        info!(path = %path.display(), "Wrote stats");
    }

    Ok(())
}
