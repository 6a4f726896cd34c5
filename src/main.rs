//! Branchmap main entry point
//!
//! This is the command-line interface for the Branchmap structure snapshotter.

use anyhow::{bail, Context};
use branchmap::config::{load_config_with_hash, BackendKind, Config};
use branchmap::crawl_with_session;
use branchmap::crawler::CrawlSettings;
use branchmap::output::{load_statistics, print_elapsed, print_report, print_statistics};
use branchmap::page::{Credentials, ItemDescriptor, PageSession, StaticHtmlSession, WebDriverSession};
use branchmap::storage::open_storage;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Branchmap: snapshot a browser-rendered item tree into SQLite
///
/// Branchmap signs in to the application, walks the group tree breadth-first
/// starting at the root item, and records every group and model it finds as
/// nodes with parent-to-child edges.
#[derive(Parser, Debug)]
#[command(name = "branchmap")]
#[command(version)]
#[command(about = "Snapshot a browser-rendered item tree into SQLite", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Location of the root item
    #[arg(value_name = "ROOT_LOCATION", required_unless_present_any = ["stats", "dry_run"])]
    root_location: Option<String>,

    /// Title of the root item, as displayed on its page
    #[arg(value_name = "ROOT_TITLE", required_unless_present_any = ["stats", "dry_run"])]
    root_title: Option<String>,

    /// Sign-in user name
    #[arg(long, env = "BRANCHMAP_USERNAME")]
    username: Option<String>,

    /// Sign-in password
    #[arg(long, env = "BRANCHMAP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }

    handle_crawl(&config, &config_hash, cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("branchmap=info,warn"),
            1 => EnvFilter::new("branchmap=debug,info"),
            2 => EnvFilter::new("branchmap=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Branchmap Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Scope: {}", config.target.scope_name);
    if let Some(root) = &cli.root_location {
        println!("  Root page: {}", config.target.item_url(root));
    }

    println!("\nBackend:");
    match config.backend.kind {
        BackendKind::Webdriver => {
            println!("  WebDriver: {}", config.backend.webdriver_url);
            println!("  Browser: {} (headless: {})", config.backend.browser, config.backend.headless);
            println!(
                "  Sign-in: {}",
                if config.session.is_some() { "configured" } else { "none" }
            );
        }
        BackendKind::Static => println!("  Static HTML over HTTP"),
    }

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Delay: {}ms", config.retry.delay_ms);
    println!("  Landmark timeout: {}s", config.retry.landmark_timeout_secs);

    println!("\nExtraction:");
    println!("  Landmark: {}", config.extraction.landmark);
    println!("  Groups: {}", config.extraction.containers);
    println!("  Models: {}", config.extraction.leaves);
    println!("  Location attribute: {}", config.extraction.location_attribute);
    println!("  Revisit policy: {:?}", config.crawl.revisit);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Builds the page session the configuration asks for
fn build_session(config: &Config, cli: &Cli) -> anyhow::Result<Box<dyn PageSession>> {
    match config.backend.kind {
        BackendKind::Webdriver => {
            let mut session = WebDriverSession::new(
                config.backend.clone(),
                config.target.clone(),
                config.extraction.clone(),
            )?;

            if let Some(flow) = &config.session {
                match (&cli.username, &cli.password) {
                    (Some(username), Some(password)) => {
                        session = session.with_sign_in(
                            flow.clone(),
                            Credentials {
                                username: username.clone(),
                                password: password.clone(),
                            },
                        );
                    }
                    (None, None) => {
                        tracing::warn!("No credentials given, skipping sign-in");
                    }
                    _ => bail!("--username and --password must be given together"),
                }
            }

            Ok(Box::new(session))
        }
        BackendKind::Static => Ok(Box::new(StaticHtmlSession::new(
            config.target.clone(),
            config.extraction.clone(),
        )?)),
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str, cli: Cli) -> anyhow::Result<()> {
    let (Some(location), Some(title)) = (cli.root_location.clone(), cli.root_title.clone()) else {
        bail!("ROOT_LOCATION and ROOT_TITLE are required to crawl");
    };

    let mut session = build_session(config, &cli)?;
    let mut storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let settings = CrawlSettings::from_config(config, config_hash);

    tracing::info!(
        "Snapshotting scope '{}' from {}",
        config.target.scope_name,
        config.target.item_url(&location)
    );

    let start = Instant::now();
    match crawl_with_session(
        session.as_mut(),
        &mut storage,
        settings,
        ItemDescriptor::new(location, title),
    )
    .await
    {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            print_elapsed(start.elapsed());
            Err(e).context("Crawl failed")
        }
    }
}
