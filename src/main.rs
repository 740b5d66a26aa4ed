//! fsmanage - drive the operation engine from the command line.
//!
//! Scripts are TOML files that seed an in-memory filesystem and then run a
//! sequence of steps against it: operation batches, undo, redo, listings and
//! permission changes.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use fsmanage_core::{AttentionItems, ItemKind, MetadataValue, OperableItem, props};
use fsmanage_history::{EventState, HistoryConfig};
use fsmanage_ops::{
    BatchOptions, ManagerConfig, MemoryFs, Operation, OperationException, OperationHistory,
    OperationManager, Response, respond_always,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEMO_SCRIPT: &str = include_str!("../demos/demo.toml");

/// Undoable, confirmation-gated filesystem operations.
#[derive(Parser)]
#[command(name = "fsmanage")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a TOML script against an in-memory filesystem
    Run {
        /// Script to run
        script: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the bundled demonstration script
    Demo {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the bundled demonstration script
    ShowDemo,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// How the script answers confirmation requests.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ConfirmMode {
    #[default]
    Yes,
    No,
    All,
}

impl From<ConfirmMode> for Response {
    fn from(mode: ConfirmMode) -> Self {
        match mode {
            ConfirmMode::Yes => Response::Confirm,
            ConfirmMode::No => Response::Reject,
            ConfirmMode::All => Response::ConfirmAll,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Script {
    #[serde(default)]
    confirm: ConfirmMode,
    #[serde(default)]
    history: HistoryConfig,
    #[serde(default)]
    manager: ManagerConfig,
    #[serde(default)]
    seed: Vec<Seed>,
    #[serde(default, rename = "step")]
    steps: Vec<Step>,
}

/// An entry created before the first step runs.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Seed {
    path: String,
    contents: Option<String>,
    #[serde(default)]
    dir: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Step {
    Execute {
        ops: Vec<OpSpec>,
        #[serde(default)]
        sequential: bool,
        confirm: Option<ConfirmMode>,
    },
    Undo,
    Redo,
    List {
        #[serde(default)]
        path: String,
    },
    Deny {
        path: String,
    },
    Allow {
        path: String,
    },
}

impl Step {
    fn action(&self) -> &'static str {
        match self {
            Step::Execute { .. } => "execute",
            Step::Undo => "undo",
            Step::Redo => "redo",
            Step::List { .. } => "list",
            Step::Deny { .. } => "deny",
            Step::Allow { .. } => "allow",
        }
    }
}

/// An operation written with slash-separated paths.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum OpSpec {
    Copy { source: String, destination: String },
    Move { source: String, destination: String },
    Rename { path: String, name: String },
    Delete { path: String },
    CreateFile { path: String },
    CreateDirectory { path: String },
}

impl OpSpec {
    /// Resolve against the current tree; sources that do not exist are
    /// treated as files so the backend reports the failure.
    fn to_operation(&self, fs: &MemoryFs) -> Result<Operation> {
        let existing = |path: &str| -> Result<OperableItem> {
            let kind = fs.kind_of(path).unwrap_or(ItemKind::File);
            Ok(OperableItem::parse(path, kind)?)
        };

        let operation = match self {
            OpSpec::Copy {
                source,
                destination,
            } => {
                let source = existing(source)?;
                let destination = OperableItem::parse(destination, source.kind())?;
                Operation::copy(source, destination)
            }
            OpSpec::Move {
                source,
                destination,
            } => {
                let source = existing(source)?;
                let destination = OperableItem::parse(destination, source.kind())?;
                Operation::move_to(source, destination)
            }
            OpSpec::Rename { path, name } => Operation::rename(existing(path)?, name)?,
            OpSpec::Delete { path } => Operation::delete(existing(path)?),
            OpSpec::CreateFile { path } => {
                Operation::create_file(OperableItem::parse(path, ItemKind::File)?)
            }
            OpSpec::CreateDirectory { path } => {
                Operation::create_directory(OperableItem::parse(path, ItemKind::Dir)?)
            }
        };
        Ok(operation)
    }
}

/// What a single step produced.
#[derive(Debug, Serialize)]
struct StepReport {
    step: usize,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<EventState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attention: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    listing: Vec<ListingEntry>,
    position: usize,
    len: usize,
}

impl StepReport {
    fn new(step: usize, action: &'static str) -> Self {
        Self {
            step,
            action,
            state: None,
            error: None,
            detail: None,
            parent: None,
            attention: Vec::new(),
            listing: Vec::new(),
            position: 0,
            len: 0,
        }
    }

    fn with_attention(mut self, attention: &AttentionItems) -> Self {
        self.state = Some(EventState::Success);
        self.parent = attention.parent().map(ToString::to_string);
        self.attention = attention.items().map(ToString::to_string).collect();
        self
    }

    fn with_exception(mut self, state: EventState, exception: &OperationException) -> Self {
        self.state = Some(state);
        self.error = Some(exception.summary());
        self.detail = exception.detail().map(str::to_string);
        self
    }
}

#[derive(Debug, Serialize)]
struct ListingEntry {
    path: String,
    kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { script, format } => {
            let source = std::fs::read_to_string(&script)
                .wrap_err_with(|| format!("Failed to read script {}", script.display()))?;
            run_script(&source, format).await?;
        }
        Commands::Demo { format } => {
            run_script(DEMO_SCRIPT, format).await?;
        }
        Commands::ShowDemo => {
            print!("{DEMO_SCRIPT}");
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env("FSMANAGE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new("warn"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run_script(source: &str, format: OutputFormat) -> Result<()> {
    let script: Script = toml::from_str(source).wrap_err("Failed to parse script")?;

    let fs = MemoryFs::new();
    for seed in &script.seed {
        match (&seed.contents, seed.dir) {
            (_, true) => fs.create_dir_all(&seed.path),
            (contents, false) => fs.write_file(&seed.path, contents.clone().unwrap_or_default()),
        }
    }
    info!(entries = script.seed.len(), "seeded filesystem");

    let manager = OperationManager::new(
        fs.executor(),
        OperationHistory::new(script.history.clone()),
        script.manager.clone(),
    );

    let mut reports = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        debug!(step = index + 1, action = step.action(), "running step");
        let mut report = run_step(index + 1, step, &script, &fs, &manager).await?;
        report.position = manager.history().position().await;
        report.len = manager.history().len().await;

        if let OutputFormat::Text = format {
            print_report(&report);
        }
        reports.push(report);
    }

    match format {
        OutputFormat::Text => {
            println!("{}", "─".repeat(60));
            println!("Final tree:");
            for path in fs.paths() {
                println!("  {}", path);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    Ok(())
}

async fn run_step(
    number: usize,
    step: &Step,
    script: &Script,
    fs: &MemoryFs,
    manager: &OperationManager,
) -> Result<StepReport> {
    let report = StepReport::new(number, step.action());

    let report = match step {
        Step::Execute {
            ops,
            sequential,
            confirm,
        } => {
            let operations = ops
                .iter()
                .map(|spec| spec.to_operation(fs))
                .collect::<Result<Vec<_>>>()
                .wrap_err_with(|| format!("Invalid operation in step {number}"))?;

            let answer = Response::from(confirm.unwrap_or(script.confirm));
            let options = BatchOptions::new()
                .confirm(respond_always(answer))
                .allow_parallel(!sequential);

            match manager.execute(operations, options) {
                Ok(task) => match task.await {
                    Ok(attention) => report.with_attention(&attention),
                    Err(exception) => {
                        let state = if exception.reverted() {
                            EventState::Reverted
                        } else {
                            EventState::Failed
                        };
                        report.with_exception(state, &exception)
                    }
                },
                Err(err) => StepReport {
                    error: Some(err.to_string()),
                    ..report
                },
            }
        }
        Step::Undo | Step::Redo => {
            let history = manager.history();
            let result = match step {
                Step::Undo => history.undo().await,
                _ => history.redo().await,
            };
            match result {
                Ok(result) => match result.outcome() {
                    Ok(attention) => StepReport {
                        state: Some(result.state()),
                        ..report.with_attention(attention)
                    },
                    Err(exception) => report.with_exception(result.state(), exception),
                },
                Err(err) => StepReport {
                    error: Some(err.to_string()),
                    ..report
                },
            }
        }
        Step::List { path } => {
            let mut listing = Vec::new();
            for item in fs.list(path) {
                let metadata = manager.get_metadata(&item, &[props::SIZE]).await;
                let size = match metadata.get(props::SIZE) {
                    Some(MetadataValue::Size(size)) => Some(*size),
                    _ => None,
                };
                listing.push(ListingEntry {
                    path: item.path().to_string(),
                    kind: item.kind(),
                    size,
                });
            }
            StepReport { listing, ..report }
        }
        Step::Deny { path } => {
            fs.deny(path);
            StepReport {
                detail: Some(format!("denied {path}")),
                ..report
            }
        }
        Step::Allow { path } => {
            fs.allow(path);
            StepReport {
                detail: Some(format!("allowed {path}")),
                ..report
            }
        }
    };

    Ok(report)
}

fn print_report(report: &StepReport) {
    println!("{}", "─".repeat(60));
    let state = report
        .state
        .map(|state| format!("{state:?}").to_lowercase())
        .unwrap_or_default();
    println!(
        "[{}] {} {}  (history {}/{})",
        report.step, report.action, state, report.position, report.len
    );

    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
    if let Some(detail) = &report.detail {
        println!("  {detail}");
    }
    if !report.attention.is_empty() {
        println!("  attention: {}", report.attention.iter().join(", "));
    }
    if let Some(parent) = &report.parent {
        println!("  parent: {parent}");
    }
    for entry in &report.listing {
        let size = entry.size.map(format_size).unwrap_or_default();
        let marker = if entry.kind == ItemKind::Dir { "/" } else { "" };
        println!("  {:<40} {:>10}", format!("{}{marker}", entry.path), size);
    }
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
