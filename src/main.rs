//! Portal-Harvest main entry point
//!
//! This is the command-line interface for the Portal-Harvest document crawler.

use anyhow::{bail, Context};
use clap::Parser;
use portal_harvest::config::{load_config_with_hash, Config, JobEntry};
use portal_harvest::crawler::{
    default_workers, run_parallel, run_sequential, Coordinator, CrawlJob, FetchSettings, Fetcher, JobOutcome,
};
use portal_harvest::output::{index, print_summary, FileSink};
use portal_harvest::sites::discover_issues;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Portal-Harvest: a resilient government document crawler
///
/// Portal-Harvest walks paginated document listings, writes every document
/// it finds as a Markdown file with its attachments, and appends one row per
/// document to a SQLite index.
#[derive(Parser, Debug)]
#[command(name = "portal-harvest")]
#[command(version)]
#[command(about = "A resilient government document crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show row counts per sheet from the index and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Run jobs concurrently
    #[arg(long)]
    parallel: bool,

    /// Concurrent jobs in parallel mode (overrides the config)
    #[arg(long, value_name = "N", requires = "parallel")]
    workers: Option<usize>,

    /// Only run the named job (repeatable)
    #[arg(long = "job", value_name = "NAME")]
    jobs: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let selected = select_jobs(&config, &cli.jobs)?;

    if cli.dry_run {
        handle_dry_run(&config, &selected);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(&config, &selected, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("portal_harvest=info,warn"),
            1 => EnvFilter::new("portal_harvest=debug,info"),
            2 => EnvFilter::new("portal_harvest=trace,debug"),
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

/// Jobs named with `--job`, or every job when none are named
fn select_jobs<'a>(config: &'a Config, names: &[String]) -> anyhow::Result<Vec<&'a JobEntry>> {
    if names.is_empty() {
        return Ok(config.jobs.iter().collect());
    }

    names
        .iter()
        .map(|name| match config.job(name) {
            Some(job) => Ok(job),
            None => bail!("No job named '{}' in the configuration", name),
        })
        .collect()
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, jobs: &[&JobEntry]) {
    println!("=== Portal-Harvest Dry Run ===\n");

    println!("Fetch Configuration:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Retry delay: {}s", config.fetch.retry_delay_secs);
    println!("  Max retries: {}", config.fetch.max_retries);
    println!("  Skipped attachment suffixes: {}", config.fetch.skip_suffixes.join(", "));

    if let Some(proxy) = &config.proxy {
        println!("\nProxy:");
        println!("  http: {}", proxy.http.as_deref().unwrap_or("-"));
        println!("  https: {}", proxy.https.as_deref().unwrap_or("-"));
    }

    println!("\nOutput:");
    println!("  Root: {}", config.output.root.display());
    println!("  Index: {}", config.output.index_path().display());

    println!("\nJobs ({}):", jobs.len());
    for job in jobs {
        println!("  - {} [{}]", job.name, job.site);
        println!("    * url: {}", job.url);
        println!("    * dir: {}", job.output_dir(&config.output.root).display());
        println!("    * sheet: {}", job.sheet_name());
        match &job.page_marker {
            Some(marker) => println!(
                "    * pages: {}<count>{}…{}",
                marker.prefix, marker.delimiter, marker.suffix
            ),
            None if job.site.is_bulletin() => println!("    * pages: one job per bulletin issue"),
            None => println!("    * pages: single page"),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows the sheets of the index
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let index_path = config.output.index_path();
    println!("Index: {}\n", index_path.display());

    if !index_path.exists() {
        println!("No index yet");
        return Ok(());
    }

    for sheet in index::list_sheets(&index_path)? {
        let rows = index::read_rows(&index_path, &sheet)?;
        println!("  {}: {} rows", sheet, rows.len());
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, entries: &[&JobEntry], cli: &Cli) -> anyhow::Result<()> {
    let fetcher = Arc::new(
        Fetcher::new(FetchSettings::from(&config.fetch), config.proxy.as_ref())
            .context("Failed to build HTTP client")?,
    );
    let sink = Arc::new(FileSink::new(Arc::clone(&fetcher)));
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&fetcher),
        sink,
        config.fetch.skip_suffixes.clone(),
    ));

    std::fs::create_dir_all(&config.output.root)
        .with_context(|| format!("Failed to create {}", config.output.root.display()))?;

    let mut outcomes = Vec::new();
    let mut jobs = Vec::new();
    for entry in entries {
        if entry.site.is_bulletin() {
            match discover_issues(&fetcher, &entry.url).await {
                Ok(issues) => {
                    for issue in &issues {
                        jobs.push(CrawlJob::for_issue(entry, &config.output, issue)?);
                    }
                }
                Err(e) => {
                    tracing::error!("Job {} failed to list bulletin issues: {}", entry.name, e);
                    outcomes.push(JobOutcome {
                        name: entry.name.clone(),
                        result: Err(e),
                    });
                }
            }
        } else {
            jobs.push(CrawlJob::from_entry(entry, &config.output)?);
        }
    }

    tracing::info!("Starting harvest of {} jobs", jobs.len());

    if cli.parallel {
        let workers = cli.workers.unwrap_or(match config.output.parallel_workers {
            0 => default_workers(),
            n => n,
        });
        outcomes.extend(run_parallel(Arc::clone(&coordinator), jobs, workers).await);
    } else {
        outcomes.extend(run_sequential(&coordinator, &jobs).await);
    }

    println!();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(summary) => print_summary(summary),
            Err(e) => println!("=== {} (failed) ===\n  {}\n", outcome.name, e),
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        bail!("{} of {} jobs failed", failed, outcomes.len());
    }

    tracing::info!("Harvest completed successfully");
    Ok(())
}
