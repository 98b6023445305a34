//! Dealboard - closed-won revenue leaderboard
//!
//! Serves this month's closed-won HubSpot revenue per allow-listed sales
//! owner as JSON, along with a dashboard page that charts it.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, bind failure, or a failed --once fetch)

mod analysis;
mod cli;
mod config;
mod crm;
mod directory;
mod models;
mod report;
mod server;

use analysis::SalesRules;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use crm::{ClientConfig, CrmSource, HubSpotClient};
use directory::OwnerDirectory;
use models::{Leaderboard, ReportingPeriod};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the token may already be in the environment
    let _ = dotenvy::dotenv();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Dealboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Dealboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .dealboard.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set the closed-won stage and the owner allow-list.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the pipeline and either serve it or run it once. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let api_key = args.api_key.clone().unwrap_or_default();
    let client = HubSpotClient::new(ClientConfig {
        base_url: config.crm.base_url.clone(),
        api_key,
        timeout_seconds: config.crm.timeout_seconds,
    })?;
    let source: Arc<dyn CrmSource> = Arc::new(client);

    let directory = Arc::new(OwnerDirectory::new(
        config.crm.page_limit,
        config.pipeline.owner_fetch_failure,
    ));
    let rules = Arc::new(SalesRules::from(&config));

    info!("CRM: {}", config.crm.base_url);
    info!(
        "Closed-won stage {} | {} allow-listed owners | deal failures: {:?}",
        rules.closed_won_stage,
        rules.allowed_owners.len(),
        rules.deal_failure
    );

    if args.once {
        return run_once(&args, source.as_ref(), &directory, &rules).await;
    }

    let state = server::AppState {
        source,
        directory,
        rules,
        surface_upstream_errors: config.server.surface_upstream_errors,
    };
    server::serve(state, &config.server.host, config.server.port).await?;
    Ok(0)
}

/// Handle --once: aggregate the current month, write the report, exit.
async fn run_once(
    args: &Args,
    source: &dyn CrmSource,
    directory: &OwnerDirectory,
    rules: &SalesRules,
) -> Result<i32> {
    let period = ReportingPeriod::current();
    let result = analysis::aggregate_sales(source, directory, rules, period).await;
    let completeness = result.completeness();
    let (rows, error) = result.into_parts();

    let board = Leaderboard {
        period,
        generated_at: Utc::now(),
        completeness,
        error: error.map(|e| e.to_string()),
        rows: rows.unwrap_or_default(),
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&board)?,
        OutputFormat::Markdown => report::generate_markdown_report(&board),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => println!("{}", output),
    }

    if board.error.is_some() {
        warn!("Leaderboard for {} is {}", period, completeness);
    }

    Ok(if matches!(completeness, models::Completeness::Failed) {
        1
    } else {
        0
    })
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
