//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::MAX_PRECISION;
use crate::models::SortKey;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Zone Averages - compare hunting zones from exported session logs
///
/// Upload session JSON files, filter by vocation and mode, and see the
/// average metric per zone. Serve it in the browser or run it once from
/// the command line.
///
/// Examples:
///   zone-averages serve
///   zone-averages serve --bind 0.0.0.0 --port 8080
///   zone-averages report ./hunts --vocation Knight --mode Solo
///   zone-averages report a.json b.json --format markdown -o zones.md
///   zone-averages init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .zone-averages.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate session files from disk and write the result
    Report(ReportArgs),

    /// Run the upload-and-display web app
    Serve(ServeArgs),

    /// Generate a default .zone-averages.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReportArgs {
    /// Session files or directories containing them
    #[arg(required = true, value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Vocation to filter on (defaults to the configured or first one seen)
    #[arg(long, value_name = "VOCATION")]
    pub vocation: Option<String>,

    /// Mode to filter on (defaults to the configured or first one seen)
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Output format (csv, markdown, json)
    #[arg(long, default_value = "csv", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Row ordering (zone, average, count)
    #[arg(long, default_value = "zone", value_name = "KEY")]
    pub sort: SortKey,

    /// Decimal places for averages
    #[arg(long, value_name = "DIGITS")]
    pub precision: Option<usize>,

    /// Keys to read the averaged metric from (comma-separated)
    ///
    /// Example: --metric-field Balance,balance
    #[arg(long, value_name = "KEYS", value_delimiter = ',')]
    pub metric_field: Option<Vec<String>>,

    /// Exit with code 2 if any hunt is pending
    #[arg(long)]
    pub fail_on_pending: bool,

    /// Exit with code 2 if any file was rejected
    #[arg(long)]
    pub fail_on_error: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, value_name = "ADDR", env = "ZONE_AVERAGES_BIND")]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT", env = "ZONE_AVERAGES_PORT")]
    pub port: Option<u16>,

    /// Decimal places for averages
    #[arg(long, value_name = "DIGITS")]
    pub precision: Option<usize>,
}

/// Output format for the report command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// CSV with a Zone,Average header (default)
    #[default]
    Csv,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Report(report) => {
                for path in &report.paths {
                    if !path.exists() {
                        return Err(format!("Path does not exist: {}", path.display()));
                    }
                }

                if let Some(ref vocation) = report.vocation {
                    if vocation.trim().is_empty() {
                        return Err("Vocation must not be empty".to_string());
                    }
                }
                if let Some(ref mode) = report.mode {
                    if mode.trim().is_empty() {
                        return Err("Mode must not be empty".to_string());
                    }
                }

                if let Some(ref fields) = report.metric_field {
                    if fields.iter().all(|f| f.trim().is_empty()) {
                        return Err("At least one metric field is required".to_string());
                    }
                }

                validate_precision(report.precision)
            }
            Command::Serve(serve) => {
                if serve.port == Some(0) {
                    return Err("Port must be between 1 and 65535".to_string());
                }
                validate_precision(serve.precision)
            }
            Command::InitConfig => Ok(()),
        }
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

fn validate_precision(precision: Option<usize>) -> Result<(), String> {
    match precision {
        Some(p) if p > MAX_PRECISION => Err(format!(
            "Precision must be at most {} decimal places",
            MAX_PRECISION
        )),
        _ => Ok(()),
    }
}
