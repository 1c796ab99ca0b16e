//! JSONL activity log: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! tailing reader never sees a partial line.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. Fallback path (the system temp directory by default)
//! 3. stderr with `[FH-JSONL]` prefix
//! 4. Silent discard (a scan never fails because logging did)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FhError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScanStart,
    ScanComplete,
    ScanCancelled,
    FixApplied,
    FixDryRun,
    FixFailed,
    Error,
}

/// A single log line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `[file.issue]` tag of a fix outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details, e.g. the rendered change of a fix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            path: None,
            tag: None,
            scanned: None,
            skipped: None,
            unhealthy: None,
            issues: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the file would exceed this size. Default: 10 MiB.
    pub max_size_bytes: u64,
    /// Rotated generations kept next to the live file. Default: 3.
    pub max_rotated_files: u32,
    /// Minimum seconds between `sync_data` calls. Default: 10.
    pub fsync_interval_secs: u64,
}

impl JsonlConfig {
    /// Config writing to `path` with the default limits.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            fallback_path: Some(std::env::temp_dir().join("filehealth-activity.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
        }
    }
}

/// `~/.local/share/filehealth/activity.jsonl`.
#[must_use]
pub fn default_log_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(std::env::temp_dir, PathBuf::from);
    home.join(".local/share/filehealth/activity.jsonl")
}

/// Current destination of log lines. Only ever moves down the chain.
enum Sink {
    File {
        out: BufWriter<File>,
        path: PathBuf,
        len: u64,
        is_fallback: bool,
    },
    Stderr,
    Discard,
}

/// Append-only JSONL writer with rotation and fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
    synced_at: SystemTime,
}

impl JsonlWriter {
    /// Open the log file, falling through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let sink = match file_sink(&config.path, false) {
            Ok(sink) => sink,
            Err(e) => fallback_sink(&config, &e.to_string()),
        };
        Self {
            config,
            sink,
            synced_at: SystemTime::now(),
        }
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.write_line(&line);
            }
            Err(e) => notice(format_args!("cannot serialize entry: {e}")),
        }
    }

    pub fn flush(&mut self) {
        if let Sink::File { out, .. } = &mut self.sink {
            let _ = out.flush();
        }
    }

    pub fn fsync(&mut self) {
        if let Sink::File { out, .. } = &mut self.sink {
            let _ = out.flush();
            let _ = out.get_ref().sync_data();
        }
        self.synced_at = SystemTime::now();
    }

    /// `normal`, `fallback`, `stderr` or `discard`.
    pub fn state(&self) -> &'static str {
        match &self.sink {
            Sink::File {
                is_fallback: false, ..
            } => "normal",
            Sink::File {
                is_fallback: true, ..
            } => "fallback",
            Sink::Stderr => "stderr",
            Sink::Discard => "discard",
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        let extra = line.len() as u64;
        let limit = self.config.max_size_bytes;
        if matches!(&self.sink, Sink::File { len, .. } if *len > 0 && *len + extra > limit) {
            self.rotate();
        }

        let failed = match &mut self.sink {
            Sink::File { out, len, .. } => {
                let result = out.write_all(line.as_bytes());
                if result.is_ok() {
                    *len += extra;
                }
                result.err()
            }
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[FH-JSONL] {line}");
                None
            }
            Sink::Discard => None,
        };

        match failed {
            // Each degrade step moves strictly down the chain, so this ends.
            Some(e) => {
                self.degrade(&e.to_string());
                self.write_line(line);
            }
            None => self.sync_if_due(),
        }
    }

    fn sync_if_due(&mut self) {
        let interval = Duration::from_secs(self.config.fsync_interval_secs);
        if self.synced_at.elapsed().map_or(true, |age| age >= interval) {
            self.fsync();
        }
    }

    fn degrade(&mut self, reason: &str) {
        self.sink = match std::mem::replace(&mut self.sink, Sink::Discard) {
            Sink::File {
                is_fallback: false,
                ..
            } => fallback_sink(&self.config, reason),
            Sink::File {
                is_fallback: true,
                path,
                ..
            } => {
                notice(format_args!(
                    "fallback {} failed ({reason}), using stderr",
                    path.display()
                ));
                Sink::Stderr
            }
            Sink::Stderr | Sink::Discard => Sink::Discard,
        };
    }

    fn rotate(&mut self) {
        let (mut out, path, is_fallback) = match std::mem::replace(&mut self.sink, Sink::Discard) {
            Sink::File {
                out,
                path,
                is_fallback,
                ..
            } => (out, path, is_fallback),
            other => {
                self.sink = other;
                return;
            }
        };
        let _ = out.flush();
        drop(out);

        shift_generations(&path, self.config.max_rotated_files);
        self.sink = match file_sink(&path, is_fallback) {
            Ok(sink) => sink,
            Err(e) if is_fallback => {
                notice(format_args!("cannot reopen {} ({e}), using stderr", path.display()));
                Sink::Stderr
            }
            Err(e) => fallback_sink(&self.config, &e.to_string()),
        };
    }
}

// ──────────────────────── helpers ────────────────────────

fn file_sink(path: &Path, is_fallback: bool) -> Result<Sink> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| FhError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| FhError::io(path, source))?;
    let len = file.metadata().map_or(0, |m| m.len());
    Ok(Sink::File {
        out: BufWriter::new(file),
        path: path.to_path_buf(),
        len,
        is_fallback,
    })
}

/// Second link of the chain, used once the primary file is unusable.
fn fallback_sink(config: &JsonlConfig, reason: &str) -> Sink {
    let primary = config.path.display();
    let Some(fallback) = config.fallback_path.as_deref() else {
        notice(format_args!("{primary} unusable ({reason}), using stderr"));
        return Sink::Stderr;
    };
    match file_sink(fallback, true) {
        Ok(sink) => {
            notice(format_args!(
                "{primary} unusable ({reason}), using fallback {}",
                fallback.display()
            ));
            sink
        }
        Err(e) => {
            notice(format_args!(
                "{primary} unusable ({reason}) and fallback failed ({e}), using stderr"
            ));
            Sink::Stderr
        }
    }
}

/// Renames `base.N-1` to `base.N` down to `base` itself becoming `base.1`.
/// The oldest generation falls off the end.
fn shift_generations(base: &Path, keep: u32) {
    if keep == 0 {
        let _ = fs::remove_file(base);
        return;
    }
    let _ = fs::remove_file(rotated_name(base, keep));
    for generation in (1..keep).rev() {
        let _ = fs::rename(
            rotated_name(base, generation),
            rotated_name(base, generation + 1),
        );
    }
    let _ = fs::rename(base, rotated_name(base, 1));
}

fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

fn notice(msg: std::fmt::Arguments<'_>) {
    let _ = writeln!(io::stderr(), "[FH-JSONL] {msg}");
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────
