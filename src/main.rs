//! Zone Averages - compare hunting zones from exported session logs
//!
//! Serves an upload-and-display web app, or aggregates session files from
//! disk in a single command-line run.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, unreadable config, bind failure, etc.)
//!   2 - Pending hunts or rejected files with --fail-on-pending / --fail-on-error

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod report;
mod scanner;
mod server;
mod session;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, OutputFormat, ReportArgs};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use ingest::{FieldAliases, Ingestor};
use models::{Dataset, FileOutcome, IngestReport, ReportMetadata, ZoneReport};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Zone Averages v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .zone-averages.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize field names, precision, and server settings.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so CSV written to stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
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

/// Dispatch the selected subcommand. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match &args.command {
        Command::Report(report_args) => run_report(report_args, &config, args.quiet),
        Command::Serve(_) => {
            server::serve(&config).await?;
            Ok(0)
        }
        Command::InitConfig => Ok(0),
    }
}

/// Run the complete report workflow. Returns exit code (0 or 2).
fn run_report(args: &ReportArgs, config: &Config, quiet: bool) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: Find the session files
    let file_scanner = scanner::FileScanner::new(scanner::ScanConfig::from(&config.ingest));
    let files = file_scanner.scan(&args.paths)?;

    if files.is_empty() {
        warn!("No session files found");
    } else {
        info!("Found {} session file(s)", files.len());
    }

    // Step 2: Ingest them
    let progress_bar = if quiet || files.len() < 2 {
        None
    } else {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let mut ingestor = Ingestor::new(Arc::new(FieldAliases::from(&config.ingest)));
    let mut dataset = Dataset::default();
    let mut outcomes = Vec::with_capacity(files.len());

    for file in &files {
        if let Some(ref pb) = progress_bar {
            pb.set_message(file.display.clone());
        }

        let outcome = match std::fs::read(&file.path) {
            Ok(bytes) => ingestor.ingest_file(&file.display, &bytes, &mut dataset),
            Err(e) => {
                warn!("Failed to read {}: {}", file.path.display(), e);
                FileOutcome::rejected(file.display.clone(), format!("read error: {}", e))
            }
        };
        outcomes.push(outcome);

        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let ingest_report = IngestReport { files: outcomes };
    if dataset.is_empty() {
        warn!("No hunts found in the given files");
    }

    // Step 3: Aggregate
    let filter = analysis::resolve_filter(
        &dataset.records,
        args.vocation.as_deref().map(str::trim),
        args.mode.as_deref().map(str::trim),
        &config.general.default_vocation,
        &config.general.default_mode,
    );
    info!("Filtering on {}", filter);

    let mut rows = analysis::aggregate_by_zone(&dataset.records, &filter);
    analysis::sort_rows(&mut rows, args.sort);

    let files_rejected = ingest_report.rejected().count();

    let metadata = ReportMetadata {
        generated_at: Utc::now(),
        files_read: ingest_report.files.len(),
        files_rejected,
        records: dataset.records.len(),
        pending: dataset.pending.len(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = ZoneReport {
        metadata,
        filter,
        rows,
        pending: dataset.pending,
        files: ingest_report.files,
    };

    // Step 4: Render and write
    let precision = config.export.precision;
    let output = match args.format {
        OutputFormat::Csv => report::generate_csv(&report.rows, precision),
        OutputFormat::Markdown => report::generate_markdown_report(&report, precision),
        OutputFormat::Json => report::generate_json_report(&report)?,
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
        }
        None => print!("{}", output),
    }

    // Print summary
    if !quiet {
        eprintln!("\n📊 Zone Summary ({}):", report.filter);
        eprintln!(
            "   Files: {} read, {} rejected",
            report.metadata.files_read, report.metadata.files_rejected
        );
        eprintln!(
            "   Hunts: {} complete, {} pending",
            report.metadata.records, report.metadata.pending
        );
        eprintln!("   Zones: {}", report.rows.len());
        if let Some(ref path) = args.output {
            eprintln!("\n✅ Report saved to: {}", path.display());
        }
    }

    // Check --fail-on-* flags
    if args.fail_on_error && files_rejected > 0 {
        eprintln!(
            "\n⛔ {} file(s) rejected. Failing (exit code 2).",
            files_rejected
        );
        return Ok(2);
    }
    if args.fail_on_pending && !report.pending.is_empty() {
        eprintln!(
            "\n⛔ {} hunt(s) pending. Failing (exit code 2).",
            report.pending.len()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
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
