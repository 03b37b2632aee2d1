//! Sanctions-Harvest main entry point
//!
//! This is the command-line interface for the sanctions-circular ingester.

use anyhow::{bail, Context};
use chrono::{Datelike, Utc};
use clap::Parser;
use sanctions_harvest::config::{load_config_with_hash, Config, LogSink};
use sanctions_harvest::crawler::{run_crawl, years_to_visit, CrawlSummary};
use sanctions_harvest::query::{
    get_profiles_page, get_stats, print_profiles_page, print_search_results, print_stats,
    search_by_name, DEFAULT_PAGE_SIZE,
};
use sanctions_harvest::storage::{open_storage, SqliteStorage, Storage};
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Sanctions-Harvest: an incremental sanctions-circular ingester
///
/// Discovers the regulator's year-indexed circular PDFs, extracts
/// sanctioned-person records and stores them in SQLite. Documents already
/// ingested are never downloaded again.
#[derive(Parser, Debug)]
#[command(name = "sanctions-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental sanctions-circular ingester", long_about = None)]
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

    /// Crawl only this year instead of following the year policy
    #[arg(long, value_name = "YEAR")]
    year: Option<i32>,

    /// Validate config and show which years would be crawled
    #[arg(long, conflicts_with_all = ["stats", "search", "list"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "search", "list"])]
    stats: bool,

    /// Search stored profiles by name fragment and exit
    #[arg(long, value_name = "NAME", conflicts_with_all = ["dry_run", "stats", "list"])]
    search: Option<String>,

    /// List stored profiles a page at a time and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "search"])]
    list: bool,

    /// Page to show with --list
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Profiles per page with --list (at most 100)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Only list profiles with this exact nationality
    #[arg(long, value_name = "NATIONALITY", requires = "list")]
    nationality: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(&config, cli.verbose, cli.quiet)?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config, cli.year)?;
    } else if cli.stats {
        handle_stats(&config, cli.json)?;
    } else if let Some(name) = &cli.search {
        handle_search(&config, name, cli.json)?;
    } else if cli.list {
        handle_list(&config, &cli)?;
    } else {
        handle_crawl(config, &config_hash, cli.year, cli.json).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber from the configured sink and verbosity
fn setup_logging(config: &Config, verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sanctions_harvest=info,warn"),
            1 => EnvFilter::new("sanctions_harvest=debug,info"),
            2 => EnvFilter::new("sanctions_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    match config.logging.sink {
        LogSink::None => {}
        LogSink::Console => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .init();
        }
        LogSink::File => {
            let Some(path) = &config.logging.file else {
                bail!("logging.sink is \"file\" but logging.file is not set");
            };
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .init();
        }
    }

    Ok(())
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path)
        .with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: validates config and shows which years would be crawled
fn handle_dry_run(config: &Config, year: Option<i32>) -> anyhow::Result<()> {
    println!("=== Sanctions-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Index: {}", config.site.index_url);
    println!("  Year link pattern: {}", config.site.year_link_pattern);
    println!("  Year page template: {}", config.site.year_page_template);

    println!("\nCrawler Configuration:");
    println!("  Epoch year: {}", config.crawler.epoch_year);
    println!("  Year policy: {:?}", config.crawler.year_policy);
    println!("  Max pages per document: {}", config.crawler.max_pages);
    println!("  Commit every: {} pages", config.crawler.commit_every_pages);
    println!("  Time budget: {}s", config.crawler.time_budget_secs);
    println!(
        "  Timeouts: {}s request, {}s download",
        config.crawler.request_timeout_secs, config.crawler.download_timeout_secs
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    match &config.storage.backup_path {
        Some(backup) => println!("  Backup: {}", backup),
        None => println!("  Backup: none"),
    }

    // Read an existing store as found; a dry run neither creates nor migrates it
    let database_path = Path::new(&config.storage.database_path);
    let existing = if database_path.is_file() {
        let storage = SqliteStorage::open_query_only(database_path)
            .with_context(|| format!("Failed to open database {}", database_path.display()))?;
        match storage.distinct_years() {
            Ok(years) => years,
            Err(e) => {
                println!("  ! Schema upgrade pending ({}); years not counted", e);
                BTreeSet::new()
            }
        }
    } else {
        BTreeSet::new()
    };

    let plan = years_to_visit(
        config.crawler.year_policy,
        &existing,
        config.crawler.epoch_year,
        Utc::now().year(),
        year,
    );

    println!("\n✓ Configuration is valid");
    println!("✓ {} years already stored", existing.len());
    match (plan.first(), plan.last()) {
        (Some(first), Some(last)) if first != last => {
            println!("✓ Would crawl {} years: {}..={}", plan.len(), first, last)
        }
        (Some(only), _) => println!("✓ Would crawl year {}", only),
        _ => println!("✓ Nothing to crawl"),
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let stats = get_stats(&storage)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Database: {}\n", config.storage.database_path);
    print_stats(&stats);

    if let Some(run) = storage.get_latest_run()? {
        println!();
        println!("Latest Run:");
        println!("  Started: {}", run.started_at);
        println!("  Status: {}", run.status.to_db_string());
        println!(
            "  Documents: {}, profiles added: {}",
            run.documents_processed, run.profiles_added
        );
    }

    Ok(())
}

/// Handles the --search mode
fn handle_search(config: &Config, name: &str, json: bool) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let results = search_by_name(&storage, name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_search_results(&results);
    }
    Ok(())
}

/// Handles the --list mode
fn handle_list(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let page = get_profiles_page(&storage, cli.page, cli.page_size, cli.nationality.as_deref())?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print_profiles_page(&page);
    }
    Ok(())
}

fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary (run {}) ===\n", summary.run_id);
    println!("  Years visited: {:?}", summary.years_visited);
    println!("  Years completed: {:?}", summary.years_completed);
    println!("  Documents processed: {}", summary.documents_processed);
    println!("  Documents skipped: {}", summary.documents_skipped);
    println!("  Documents failed: {}", summary.documents_failed);
    println!("  Profiles added: {}", summary.profiles_added);
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    if summary.budget_exhausted {
        println!("\n! Time budget exhausted; the next run continues from here");
    }
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    year: Option<i32>,
    json: bool,
) -> anyhow::Result<()> {
    match year {
        Some(year) => tracing::info!("Starting crawl for year {}", year),
        None => tracing::info!(
            "Starting crawl ({:?} year policy from {})",
            config.crawler.year_policy,
            config.crawler.epoch_year
        ),
    }

    let summary = run_crawl(config, config_hash, year)
        .await
        .context("Crawl failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}
