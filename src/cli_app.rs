//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::SystemTime;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use filehealth::cli::prompt::confirm;
use filehealth::cli::signals::SignalCancel;
use filehealth::core::cancel::CancelToken;
use filehealth::core::config::Config;
use filehealth::core::errors::FhError;
use filehealth::logger::activity::{ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger};
use filehealth::logger::jsonl::JsonlConfig;
use filehealth::remediation::outcome::{FixReport, Outcome, OutcomeStatus};
use filehealth::scanner::engine::Scanner;
use filehealth::scanner::file::ScannedFile;
use filehealth::scanner::stats::format_duration;

/// filehealth: find and fix files with unhealthy metadata.
#[derive(Debug, Parser)]
#[command(
    name = "filehealth",
    author,
    version,
    about = "File metadata health scanner",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan directory trees and report unhealthy files.
    Scan(ScanArgs),
    /// Scan, then fix the issues found.
    Fix(FixArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct FilterArgs {
    /// Only scan names matching this regex (repeatable).
    #[arg(long, value_name = "REGEX")]
    include: Vec<String>,
    /// Skip names matching this regex (repeatable).
    #[arg(long, value_name = "REGEX")]
    exclude: Vec<String>,
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Root directories to scan.
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
    #[command(flatten)]
    filter: FilterArgs,
    /// Also list entries skipped by the name filter.
    #[arg(long)]
    skipped: bool,
    /// Also list healthy files.
    #[arg(long)]
    healthy: bool,
}

#[derive(Debug, Clone, Args)]
struct FixArgs {
    /// Root directories to scan and fix.
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
    #[command(flatten)]
    filter: FilterArgs,
    /// Maximum unhealthy files to fix per root (0 = no limit).
    #[arg(long, value_name = "N")]
    batch: Option<usize>,
    /// Report the changes without writing them.
    #[arg(long)]
    dry_run: bool,
    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Some fixes failed.
    #[error("{0}")]
    Partial(String),
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<FhError> for CliError {
    fn from(err: FhError) -> Self {
        match err {
            FhError::InvalidConfig { .. }
            | FhError::MissingConfig { .. }
            | FhError::ConfigParse { .. }
            | FhError::InvalidPattern { .. } => Self::User(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Fix(args) => run_fix(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── session ────────────────────

/// Loaded config, a scanner built from it, signal-driven cancellation and
/// the activity log, for the life of one command.
struct Session {
    config: Config,
    scanner: Scanner,
    signals: SignalCancel,
    logger: Option<(ActivityLoggerHandle, thread::JoinHandle<()>)>,
}

impl Session {
    fn open(cli: &Cli, filter: &FilterArgs) -> Result<Self, CliError> {
        let mut config = Config::load(cli.config.as_deref())?;
        config.scanner.include.extend(filter.include.iter().cloned());
        config.scanner.exclude.extend(filter.exclude.iter().cloned());
        config.validate()?;

        let logger = match spawn_logger(ActivityLoggerConfig {
            jsonl: JsonlConfig::at(&config.paths.jsonl_log),
            ..ActivityLoggerConfig::default()
        }) {
            Ok(logger) => Some(logger),
            Err(e) => {
                eprintln!("[FH-CLI] activity log disabled: {e}");
                None
            }
        };

        let mut scanner = Scanner::from_config(&config, SystemTime::now())?;
        if let Some((handle, _)) = &logger {
            scanner = scanner.with_logger(handle.clone());
        }

        Ok(Self {
            config,
            scanner,
            signals: SignalCancel::install(CancelToken::new()),
            logger,
        })
    }

    fn ctx(&self) -> &CancelToken {
        self.signals.token()
    }

    fn close(self) {
        let Self { scanner, logger, .. } = self;
        drop(scanner);
        if let Some((handle, join)) = logger {
            handle.shutdown();
            if join.join().is_err() {
                eprintln!("[FH-CLI] activity logger thread panicked");
            }
        }
    }
}

// ──────────────────── scan ────────────────────

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let mut session = Session::open(cli, &args.filter)?;
    session.scanner = session
        .scanner
        .clone()
        .with_show_skipped(args.skipped || session.config.scanner.show_skipped)
        .with_show_healthy(args.healthy || session.config.scanner.show_healthy);
    let mode = output_mode(cli);

    let mut result = Ok(());
    for root in &args.paths {
        let root = absolute(root)?;
        match scan_root(&session, &root, mode) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    session.close();
    result
}

/// Scan one root. `Ok(false)` means the user cancelled.
fn scan_root(session: &Session, root: &Path, mode: OutputMode) -> Result<bool, CliError> {
    let ctx = session.ctx();
    if mode == OutputMode::Human {
        println!("----{}----", root.display());
    }

    let mut files = session.scanner.scan_dir(root);
    while files.scan(ctx) {
        let Some(file) = files.file() else { continue };
        match mode {
            OutputMode::Human => print_scanned_file(file),
            OutputMode::Json => write_json_line(&file_json(root, file))?,
        }
    }
    files.close();

    let err = files.take_err();
    let cancelled = err.as_ref().is_some_and(FhError::is_cancelled);
    match mode {
        OutputMode::Human => {
            println!(
                "----{} ({})----",
                files.stats(),
                format_duration(files.duration())
            );
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "scan",
            "root": root.to_string_lossy(),
            "stats": files.stats(),
            "duration_ms": u64::try_from(files.duration().as_millis()).unwrap_or(u64::MAX),
            "cancelled": cancelled,
        }))?,
    }

    match err {
        None => Ok(true),
        Some(_) if cancelled => Ok(false),
        Some(e) => Err(e.into()),
    }
}

fn print_scanned_file(file: &ScannedFile) {
    if file.skipped {
        println!("{}", format!("{file} (skipped)").dimmed());
    } else if file.is_healthy() {
        println!("{file}");
    } else {
        println!("{}", file.description().yellow());
    }
}

fn file_json(root: &Path, file: &ScannedFile) -> Value {
    let issues: Vec<Value> = file
        .issues
        .iter()
        .map(|issue| {
            json!({
                "handler": issue.handler_name(),
                "summary": issue.summary(),
                "description": issue.description(),
                "resolution": issue.resolution(),
            })
        })
        .collect();
    json!({
        "command": "scan",
        "root": root.to_string_lossy(),
        "index": file.index,
        "path": file.path.to_string_lossy(),
        "skipped": file.skipped,
        "issues": issues,
    })
}

// ──────────────────── fix ────────────────────

fn run_fix(cli: &Cli, args: &FixArgs) -> Result<(), CliError> {
    let session = Session::open(cli, &args.filter)?;
    let result = fix_roots(cli, args, &session);
    session.close();
    result
}

fn fix_roots(cli: &Cli, args: &FixArgs, session: &Session) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let ctx = session.ctx();
    let batch = args.batch.unwrap_or(session.config.fix.batch);
    let dry_run = args.dry_run || session.config.fix.dry_run;

    let mut files = Vec::new();
    for root in &args.paths {
        let root = absolute(root)?;
        match session.scanner.collect_files(&root, ctx, batch) {
            Ok((found, summary)) => {
                if mode == OutputMode::Human {
                    println!("----{}: {summary}----", root.display());
                    for file in &found {
                        println!("{}", file.description());
                    }
                }
                files.extend(found);
            }
            Err(e) if e.is_cancelled() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }

    if files.is_empty() {
        match mode {
            OutputMode::Human => println!("No issues found."),
            OutputMode::Json => write_json_line(&json!({
                "command": "fix",
                "dry_run": dry_run,
                "files": 0,
                "report": FixReport::default(),
            }))?,
        }
        return Ok(());
    }

    let interactive = !dry_run && !args.yes && io::stdout().is_terminal();
    if interactive {
        let question = format!("Proceed with fixes affecting {} files?", files.len());
        if !confirm(&mut io::stdin().lock(), &mut io::stdout(), &question)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut report = FixReport::default();
    for file in &files {
        let outcomes = if dry_run {
            session.scanner.dry_run(file, ctx)
        } else {
            session.scanner.fix(file, ctx)
        };
        for outcome in &outcomes {
            report.record(outcome);
            match mode {
                OutputMode::Human => print_outcome(file, outcome),
                OutputMode::Json => write_json_line(&outcome_json(file, outcome))?,
            }
        }
        if outcomes
            .iter()
            .any(|o| o.status() == OutcomeStatus::Cancelled)
        {
            break;
        }
    }

    match mode {
        OutputMode::Human => println!("{report}"),
        OutputMode::Json => write_json_line(&json!({
            "command": "fix",
            "dry_run": dry_run,
            "files": files.len(),
            "report": report,
        }))?,
    }

    if report.failed > 0 {
        return Err(CliError::Partial(format!(
            "{} of {} fixes failed",
            report.failed,
            report.total()
        )));
    }
    Ok(())
}

fn print_outcome(file: &ScannedFile, outcome: &Outcome) {
    let status = outcome.status();
    let label = format!("{}:", status.label());
    let label = match status {
        OutcomeStatus::Fixed => label.green(),
        OutcomeStatus::DryRun => label.cyan(),
        OutcomeStatus::Skipped => label.yellow(),
        OutcomeStatus::Failed => label.red(),
        OutcomeStatus::Cancelled => label.dimmed(),
    };
    println!(
        "{label} {} {}: {outcome}",
        outcome.tag(),
        file.absolute_path().display()
    );
}

fn outcome_json(file: &ScannedFile, outcome: &Outcome) -> Value {
    json!({
        "command": "fix",
        "tag": outcome.tag(),
        "path": file.absolute_path().to_string_lossy(),
        "status": outcome.status(),
        "outcome": outcome.to_string(),
        "error_code": outcome.failure().map(FhError::code),
    })
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                    "exists": exists,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            match output_mode(cli) {
                OutputMode::Human => println!("{}", config.to_toml()?),
                OutputMode::Json => write_json_line(&json!({
                    "command": "config show",
                    "config": serde_json::to_value(&config)?,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": true,
                        "path": config.paths.config_file.to_string_lossy(),
                        "hash": hash,
                    }))?,
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "error": e.to_string(),
                    }))?,
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output helpers ────────────────────

fn absolute(path: &Path) -> Result<PathBuf, CliError> {
    std::path::absolute(path).map_err(|e| CliError::User(format!("{}: {e}", path.display())))
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("FH_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
