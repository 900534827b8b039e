//! # Email Harvester CLI
//!
//! Command-line interface for the harvesting library (`email_harvester_core`).
//! Parses arguments, builds the configuration, vets proxies, runs one
//! identifier, one identifier file or every configured category, and writes
//! the results.

use email_harvester_core::{
    initialize_harvester, read_identifiers, BatchReport, CategoryConfig, Config, ConfigBuilder,
    Harvester, IdentifierOutcome, IdentifierStatus, PipelineStats,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

/// How harvested results are written.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Sorted unique emails, one per line
    Text,
    /// `{name, email}` rows
    Json,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Harvests contact email addresses from web pages.",
    long_about = "Email Harvester normalizes domains, URLs and registry codes into pages, fetches them with retries (optionally through vetted proxies) and extracts validated email addresses and entity names."
)]
struct AppArgs {
    /// File with one identifier per line (domain, URL or registry code).
    #[arg(short, long, env = "EMAIL_HARVESTER_INPUT")]
    input: Option<String>,

    /// Where to write results. Standard output when omitted.
    #[arg(short, long, env = "EMAIL_HARVESTER_OUTPUT")]
    output: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, env = "EMAIL_HARVESTER_FORMAT")]
    format: OutputFormat,

    /// Process a single identifier and print the result.
    #[arg(short, long, env = "EMAIL_HARVESTER_TARGET", conflicts_with_all = ["input", "all_categories"])]
    target: Option<String>,

    /// Category name the batch is recorded under. A configured category of
    /// that name supplies the input and output files when not given.
    #[arg(long, default_value = "default", env = "EMAIL_HARVESTER_CATEGORY")]
    category: String,

    /// Process every category declared in the configuration file, in order.
    #[arg(long, env = "EMAIL_HARVESTER_ALL_CATEGORIES", conflicts_with = "input")]
    all_categories: bool,

    /// Path to a TOML configuration file. CLI arguments override file settings.
    #[arg(long, env = "EMAIL_HARVESTER_CONFIG")]
    config_file: Option<String>,

    /// Attempts per page before giving up.
    #[arg(long, env = "EMAIL_HARVESTER_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "EMAIL_HARVESTER_TIMEOUT")]
    timeout: Option<u64>,

    /// Seconds between identifier starts.
    #[arg(long, env = "EMAIL_HARVESTER_DELAY")]
    delay: Option<f64>,

    /// Route requests through vetted proxies.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_HARVESTER_USE_PROXIES")]
    use_proxies: Option<bool>,

    /// Local proxy list, one endpoint per line.
    #[arg(long, env = "EMAIL_HARVESTER_PROXY_FILE")]
    proxy_file: Option<String>,

    /// Remote proxy list URL.
    #[arg(long, env = "EMAIL_HARVESTER_PROXY_LIST_URL")]
    proxy_list_url: Option<String>,

    /// Maximum number of identifiers processed at once.
    #[arg(short, long, env = "EMAIL_HARVESTER_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Append logs to this file instead of standard error.
    #[arg(long, env = "EMAIL_HARVESTER_LOG_FILE")]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppArgs::parse();
    init_tracing(args.log_file.as_deref())?;

    tracing::info!(
        "Email Harvester CLI v{} starting...",
        env!("CARGO_PKG_VERSION")
    );
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let config = match build_config(&args) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Configuration error: {:#}", e);
            return Err(e.context("Failed to build configuration"));
        }
    };
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight identifiers and writing results.");
            interrupt.cancel();
        }
    });

    let harvester = initialize_harvester(Arc::clone(&config))
        .await
        .context("Failed to initialize harvester")?;

    let start_time = Instant::now();
    let execution_result = if let Some(target) = args.target.as_deref() {
        process_target_mode(&harvester, &args, target, &cancel).await
    } else if args.all_categories {
        process_all_categories(&harvester, &config, &args, &cancel).await
    } else {
        process_single_category(&harvester, &config, &args, &cancel)
            .await
            .map(|_| ())
    };

    if let Err(e) = execution_result {
        tracing::error!("Execution failed: {:#}", e);
        return Err(e);
    }

    tracing::info!(
        "Processing finished. Total duration: {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

fn init_tracing(log_file: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact();

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file '{}'", path))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        None => tracing::subscriber::set_global_default(builder.finish()),
    };
    installed.context("Setting up tracing subscriber failed")
}

fn build_config(args: &AppArgs) -> Result<Config> {
    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(retries) = args.max_retries {
        config_builder = config_builder.max_retries(retries);
    }
    if let Some(t) = args.timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(delay) = args.delay {
        let delay = Duration::try_from_secs_f64(delay)
            .with_context(|| format!("Invalid --delay value {}", delay))?;
        config_builder = config_builder.delay_between_requests(delay);
    }
    if args.use_proxies == Some(true) {
        config_builder = config_builder.use_proxies(true);
    }
    if let Some(ref path) = args.proxy_file {
        config_builder = config_builder.proxy_file(path);
    }
    if let Some(ref url) = args.proxy_list_url {
        config_builder = config_builder.proxy_list_url(url);
    }
    if let Some(c) = args.concurrency {
        config_builder = config_builder.max_concurrency(c);
    }

    Ok(config_builder.build()?)
}

async fn process_target_mode(
    harvester: &Harvester,
    args: &AppArgs,
    target: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    tracing::info!("Running in single identifier mode for '{}'.", target);
    let start_time = Instant::now();

    let outcome = harvester
        .process_identifier(&args.category, target, cancel)
        .await
        .context("Processing was cancelled")?;

    match args.format {
        OutputFormat::Text => print_target_result(&outcome),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize result")?
        ),
    }
    tracing::info!("Single identifier mode finished. Duration: {:.2?}", start_time.elapsed());
    Ok(())
}

async fn process_single_category(
    harvester: &Harvester,
    config: &Config,
    args: &AppArgs,
    cancel: &CancellationToken,
) -> Result<PipelineStats> {
    let configured = config.category(&args.category);
    let input = args
        .input
        .clone()
        .or_else(|| configured.map(|c| c.urls_file.clone()))
        .with_context(|| {
            format!(
                "No input given: pass --input, --target, or declare category '{}' in the configuration",
                args.category
            )
        })?;
    let output = args
        .output
        .clone()
        .or_else(|| configured.and_then(|c| c.output_file.clone()));

    run_category(harvester, &args.category, &input, output.as_deref(), args.format, cancel).await
}

async fn process_all_categories(
    harvester: &Harvester,
    config: &Config,
    args: &AppArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    if config.categories.is_empty() {
        return Err(anyhow::anyhow!(
            "--all-categories needs at least one [[categories]] entry in the configuration"
        ));
    }
    tracing::info!("Processing {} categories.", config.categories.len());

    let mut totals = PipelineStats::new();
    for CategoryConfig {
        name,
        urls_file,
        output_file,
    } in &config.categories
    {
        if cancel.is_cancelled() {
            tracing::warn!("Cancelled; skipping remaining categories.");
            break;
        }
        let output = output_file
            .clone()
            .or_else(|| args.output.as_deref().map(|shared| category_output_path(shared, name)));
        let stats =
            run_category(harvester, name, urls_file, output.as_deref(), args.format, cancel).await?;
        totals.absorb(&stats);
    }

    tracing::info!("==================== Overall Summary ====================");
    for (name, stats) in &totals.categories {
        tracing::info!(
            "{:<20}: {} processed, {} succeeded, {} failed, {} emails",
            name,
            stats.attempted,
            stats.succeeded,
            stats.failed,
            stats.emails_found
        );
    }
    tracing::info!(
        "Total: {} processed, {} succeeded, {} emails",
        totals.attempted,
        totals.succeeded,
        totals.total_emails
    );
    tracing::info!("=========================================================");
    Ok(())
}

async fn run_category(
    harvester: &Harvester,
    category: &str,
    input: &str,
    output: Option<&str>,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<PipelineStats> {
    tracing::info!(
        "Category '{}': input '{}', output '{}'",
        category,
        input,
        output.unwrap_or("<stdout>")
    );

    let identifiers = read_identifiers(input)
        .with_context(|| format!("Failed to read identifiers from '{}'", input))?;
    if let Some(path) = output {
        prepare_output_path(path)?;
    }
    if identifiers.is_empty() {
        tracing::warn!("Input file '{}' holds no identifiers.", input);
    }

    let pb = ProgressBar::new(identifiers.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
         .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | ETA: {eta} | {msg}")
         .context("Failed to set progress bar template")?
         .progress_chars("=> "));
    pb.set_message(format!("Harvesting {}...", category));

    let report = harvester
        .run_batch_with_progress(category, identifiers, cancel.clone(), |outcome| {
            pb.inc(1);
            pb.set_message(outcome.identifier.clone());
        })
        .await;
    pb.finish_with_message(format!("Processed {} identifiers", report.outcomes.len()));

    write_results(&report, output, format)?;
    log_summary(&report);
    Ok(report.stats)
}

/// Splits a shared `--output` per category: `out/emails.txt` becomes
/// `out/emails_<category>.txt`, so one category never truncates another.
fn category_output_path(shared: &str, category: &str) -> String {
    let shared = Path::new(shared);
    let stem = shared
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    let label: String = category
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let file_name = match shared.extension() {
        Some(ext) => format!("{}_{}.{}", stem, label, ext.to_string_lossy()),
        None => format!("{}_{}", stem, label),
    };
    shared.with_file_name(file_name).to_string_lossy().into_owned()
}

fn prepare_output_path(path: &str) -> Result<()> {
    if let Some(parent_dir) = Path::new(path).parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            tracing::debug!("Creating output directory: {}", parent_dir.display());
            std::fs::create_dir_all(parent_dir).with_context(|| {
                format!(
                    "Failed to create output directory '{}'",
                    parent_dir.display()
                )
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot write to output file '{}'. Check permissions.", path))?;
    Ok(())
}

/// Writes a batch's results as text or JSON to `output`, or to stdout.
fn write_results(report: &BatchReport, output: Option<&str>, format: OutputFormat) -> Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => {
            tracing::info!("Saving results to '{}'...", path);
            let file = File::create(path)
                .with_context(|| format!("Failed to create/truncate output file '{}'", path))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(std::io::stdout().lock()),
    };

    match format {
        OutputFormat::Text => {
            for email in &report.unique_emails {
                writeln!(writer, "{}", email).context("Failed to write results")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &report.rows())
                .context("Failed to serialize results to JSON")?;
            writeln!(writer).context("Failed to write results")?;
        }
    }
    writer.flush().context("Failed to flush results")?;
    Ok(())
}

/// Logs a summary of one batch using `tracing::info`.
fn log_summary(report: &BatchReport) {
    let stats = &report.stats;
    tracing::info!("-------------------- Harvest Summary: {} --------------------", report.category);
    tracing::info!("Identifiers Processed       : {}", stats.attempted);
    tracing::info!("  - With Emails             : {}", stats.succeeded);
    tracing::info!("  - Failed                  : {}", stats.failed);
    tracing::info!("    - Skipped (Bad Input)   : {}", stats.skipped);
    tracing::info!("    - Blocked By Host       : {}", stats.blocked);
    tracing::info!("Emails Found (Unique)       : {}", report.unique_emails.len());
    tracing::info!("Total Time Taken            : {:.2?}", report.duration);
    if report.duration.as_secs_f64() > 0.01 && stats.attempted > 0 {
        let rate = (stats.attempted as f64) / report.duration.as_secs_f64();
        tracing::info!("Processing Rate             : {:.2} identifiers/sec", rate);
    }
    if report.cancelled {
        tracing::warn!("Batch was cancelled; results are partial.");
    }
    tracing::info!("------------------------------------------------------------");
}

/// Prints one identifier's result to standard output.
fn print_target_result(outcome: &IdentifierOutcome) {
    const BLUE: &str = "\x1b[34m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";

    println!("\n{BLUE}===== Email Harvester Results ====={RESET}");
    println!("Identifier: {}", outcome.identifier);
    println!("URL:        {}", outcome.url.as_deref().unwrap_or("N/A"));
    if !outcome.entity_name.is_empty() {
        println!("Name:       {}", outcome.entity_name);
    }

    match &outcome.status {
        IdentifierStatus::Succeeded => {
            println!("\n{GREEN}Status: SUCCESS{RESET}");
            for email in &outcome.emails {
                println!("- {GREEN}{}{RESET}", email);
            }
        }
        IdentifierStatus::NoEmails => println!("\n{YELLOW}Status: NO EMAIL FOUND{RESET}"),
        IdentifierStatus::Skipped(reason) => {
            println!("\n{YELLOW}Status: SKIPPED{RESET}");
            println!("Reason: {}", reason);
        }
        IdentifierStatus::Blocked(status) => {
            println!("\n{RED}Status: BLOCKED{RESET}");
            println!("Host refused access with HTTP {}", status);
        }
        IdentifierStatus::Exhausted(reason) => {
            println!("\n{RED}Status: NO CONTENT{RESET}");
            println!("Last error: {}", reason);
        }
        IdentifierStatus::ParseFailed(reason) => {
            println!("\n{RED}Status: PARSE ERROR{RESET}");
            println!("Error: {}", reason);
        }
    }

    println!("{BLUE}==================================={RESET}\n");
}
