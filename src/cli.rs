//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Dealboard - monthly closed-won revenue leaderboard
///
/// Pulls owners and deals from the HubSpot CRM, sums this month's
/// closed-won revenue per allow-listed owner, and serves it as JSON
/// for the dashboard page.
///
/// Examples:
///   dealboard
///   dealboard --port 8080 --strict
///   dealboard --once --format markdown --output leaderboard.md
///   dealboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// HubSpot private app token
    ///
    /// Usually supplied through HUBSPOT_API_KEY (a .env file is read first).
    #[arg(long, env = "HUBSPOT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .dealboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// CRM API root URL (overrides config)
    #[arg(long, value_name = "URL", env = "DEALBOARD_CRM_URL")]
    pub base_url: Option<String>,

    /// Upstream request timeout in seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Address to listen on (overrides config)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Answer 502 from /data when the deal fetch fails, instead of []
    #[arg(long)]
    pub strict: bool,

    /// Compute the leaderboard once, write it, and exit
    #[arg(long)]
    pub once: bool,

    /// Output format for --once (json, markdown)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file for --once (defaults to stdout)
    #[arg(short, long, value_name = "FILE", requires = "once")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .dealboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the one-shot report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown table
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Nothing else matters for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.api_key.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(
                    "Missing HubSpot token: set HUBSPOT_API_KEY or pass --api-key".to_string(),
                )
            }
            Some(_) => {}
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("CRM URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
