//! EmotionInsight - sentiment and emotion analysis CLI
//!
//! Sends text to a Gemini model with a structured-output schema, validates
//! the answer and keeps a local, newest-first history of analyses.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, oracle failure, invalid input, etc.)
//!   3 - Batch finished but at least one item failed
//!   130 - Batch cancelled with Ctrl-C

mod analysis;
mod batch;
mod cli;
mod config;
mod error;
mod gateway;
mod history;
mod models;
mod report;

use anyhow::{Context, Result};
use batch::BatchPipeline;
use cli::{Action, Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use gateway::{AnalysisGateway, GeminiOracle};
use history::HistoryStore;
use indicatif::{ProgressBar, ProgressStyle};
use models::AnalysisResult;
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    let action = match args.validate() {
        Ok(action) => action,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Handle --init-config early (no logging needed)
    if action == Action::InitConfig {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("EmotionInsight v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, action).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .emotioninsight.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, history location and output format.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so that stdout only carries rendered output.
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
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Run the requested action. Returns the process exit code.
async fn run(args: Args, action: Action) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let history_path = config.history.resolved_path();
    let mut store = HistoryStore::open(&history_path);
    info!(
        "History: {} entries in {}",
        store.len(),
        store.path().display()
    );

    match action {
        Action::Analyze(text) => run_single(&args, &config, &mut store, text).await,
        Action::Batch(path) => run_batch(&args, &config, &mut store, &path).await,
        Action::History => show_history(&args, &config, &store),
        Action::Show(reference) => show_entry(&args, &config, &store, &reference),
        Action::Stats => show_stats(&args, &config, &store),
        Action::ClearHistory => clear_history(&args, &mut store, confirm),
        Action::InitConfig => handle_init_config().map(|_| 0),
    }
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
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
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

/// Build the analysis gateway. Fails without an API key.
fn build_gateway(config: &Config) -> Result<AnalysisGateway> {
    let oracle = GeminiOracle::new(config.gemini_config())?;
    Ok(AnalysisGateway::new(Box::new(oracle), config.retry_policy()))
}

/// Analyze a single text and record it.
async fn run_single(
    args: &Args,
    config: &Config,
    store: &mut HistoryStore,
    text: String,
) -> Result<i32> {
    let text = if text == "-" {
        read_stdin()?
    } else {
        text
    };

    let gateway = build_gateway(config)?;
    if !args.quiet {
        eprintln!("🔬 Analyzing with {}...", gateway.model_name());
    }

    let result = gateway.analyze(&text).await?;

    let rendered = report::render_result(&result, config.output.format)?;
    emit(args, &rendered)?;

    if config.history.enabled {
        record(store.append(result));
    }

    Ok(0)
}

/// Analyze every line of a file, one at a time.
async fn run_batch(
    args: &Args,
    config: &Config,
    store: &mut HistoryStore,
    path: &Path,
) -> Result<i32> {
    let items = batch::read_batch_file(path)?;
    if items.is_empty() {
        println!("No analyzable lines in {}.", path.display());
        return Ok(0);
    }

    let gateway = build_gateway(config)?;
    let total = items.len();
    let format = config.output.format;

    if !args.quiet {
        eprintln!(
            "📦 {} items loaded from {}, analyzing with {}",
            total,
            path.display(),
            gateway.model_name()
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch");
            ctrl_c.cancel();
        }
    });

    let progress = progress_bar(total as u64, args.quiet || format == OutputFormat::Json)?;
    let live_feed = format == OutputFormat::Text && args.output.is_none();

    let batch_report = BatchPipeline::new(&gateway, items)
        .with_cancellation(cancel)
        .run(|outcome, status| {
            if live_feed {
                progress.println(report::batch_item_line(outcome, total));
            }
            progress.set_position(status.completed as u64);
            progress.set_message(status.label());
        })
        .await;
    progress.finish_and_clear();

    if config.history.enabled && !batch_report.succeeded.is_empty() {
        record(store.append_many(batch_report.succeeded.clone()));
    }

    let rendered = report::render_batch(&batch_report, format)?;
    emit(args, &rendered)?;

    if batch_report.cancelled {
        Ok(130)
    } else if batch_report.has_failures() {
        Ok(3)
    } else {
        Ok(0)
    }
}

fn show_history(args: &Args, config: &Config, store: &HistoryStore) -> Result<i32> {
    let entries: Vec<&AnalysisResult> = match args.sentiment {
        Some(filter) => analysis::filter_by_sentiment(store.entries(), filter.into()),
        None => store.entries().iter().collect(),
    };
    let limit = args.limit.unwrap_or(entries.len());
    let shown = &entries[..limit.min(entries.len())];

    let rendered = report::render_history(shown, config.output.format)?;
    emit(args, &rendered)?;
    Ok(0)
}

fn show_entry(args: &Args, config: &Config, store: &HistoryStore, reference: &str) -> Result<i32> {
    match store.find(reference) {
        Some(entry) => {
            let rendered = report::render_result(entry, config.output.format)?;
            emit(args, &rendered)?;
            Ok(0)
        }
        None => {
            eprintln!("No stored analysis matches '{}'.", reference);
            Ok(1)
        }
    }
}

fn show_stats(args: &Args, config: &Config, store: &HistoryStore) -> Result<i32> {
    let stats = analysis::compute_stats(store.entries(), config.history.top_entities);
    let rendered = report::render_stats(&stats, config.output.format)?;
    emit(args, &rendered)?;
    Ok(0)
}

/// Clear the history after confirmation. `--yes` skips the question.
fn clear_history<F>(args: &Args, store: &mut HistoryStore, confirm: F) -> Result<i32>
where
    F: FnOnce(&str) -> Result<bool>,
{
    if store.is_empty() {
        println!("History is already empty.");
        return Ok(0);
    }

    if !args.yes && !confirm("Are you sure you want to clear all history?")? {
        println!("Aborted.");
        return Ok(0);
    }

    let count = store.len();
    store.clear()?;
    println!("🗑️  Cleared {} entries from {}", count, store.path().display());
    Ok(0)
}

/// Report a failed history write without aborting; memory stays authoritative.
fn record(outcome: std::result::Result<(), error::AnalysisError>) {
    if let Err(e) = outcome {
        warn!("{}", e);
        eprintln!("⚠️  Result not saved to history: {}", e);
    }
}

/// Ask a yes/no question; anything but an explicit yes declines.
fn confirm(question: &str) -> Result<bool> {
    inquire::Confirm::new(question)
        .with_default(false)
        .prompt()
        .context("Failed to read confirmation")
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read text from stdin")?;
    Ok(text)
}

fn progress_bar(total: u64, hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Write rendered output to --output or stdout.
fn emit(args: &Args, content: &str) -> Result<()> {
    match args.output {
        Some(ref path) => write_output(path, content),
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output to {}", path.display()))?;
    println!("✅ Output saved to: {}", path.display());
    Ok(())
}
