//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Scanners and fix passes send
//! [`ActivityEvent`]s through a bounded crossbeam channel; `send()` never
//! blocks, so a slow disk cannot stall a scan.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{FhError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── events ────────────────────

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    ScanStarted {
        root: String,
    },
    ScanCompleted {
        root: String,
        scanned: usize,
        skipped: usize,
        unhealthy: usize,
        issues: usize,
        duration_ms: u64,
    },
    ScanCancelled {
        root: String,
        scanned: usize,
        duration_ms: u64,
    },
    FixApplied {
        path: String,
        tag: String,
        change: String,
    },
    FixDryRun {
        path: String,
        tag: String,
        change: String,
    },
    FixFailed {
        path: String,
        tag: String,
        error_code: String,
        error_message: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

// ──────────────────── handle ────────────────────

/// Cloneable handle for sending activity events.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Non-blocking. A full channel drops the event and bumps the counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events dropped to back-pressure and not yet reported in the log.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and stop. Join its handle to wait.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

pub struct ActivityLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl Default for ActivityLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread. It runs until `shutdown()` or until every handle
/// is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("fh-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config.jsonl, &dropped))
        .map_err(|e| FhError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl_config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }
        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::ScanStarted { root } => {
            let mut e = LogEntry::new(EventType::ScanStart, Severity::Info);
            e.path = Some(root.clone());
            e
        }
        ActivityEvent::ScanCompleted {
            root,
            scanned,
            skipped,
            unhealthy,
            issues,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::ScanComplete, Severity::Info);
            e.path = Some(root.clone());
            e.scanned = Some(*scanned);
            e.skipped = Some(*skipped);
            e.unhealthy = Some(*unhealthy);
            e.issues = Some(*issues);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::ScanCancelled {
            root,
            scanned,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::ScanCancelled, Severity::Warning);
            e.path = Some(root.clone());
            e.scanned = Some(*scanned);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(false);
            e
        }
        ActivityEvent::FixApplied { path, tag, change } => {
            let mut e = LogEntry::new(EventType::FixApplied, Severity::Info);
            e.path = Some(path.clone());
            e.tag = Some(tag.clone());
            e.details = Some(change.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::FixDryRun { path, tag, change } => {
            let mut e = LogEntry::new(EventType::FixDryRun, Severity::Info);
            e.path = Some(path.clone());
            e.tag = Some(tag.clone());
            e.details = Some(change.clone());
            e
        }
        ActivityEvent::FixFailed {
            path,
            tag,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::FixFailed, Severity::Warning);
            e.path = Some(path.clone());
            e.tag = Some(tag.clone());
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::Error, Severity::Info),
    }
}

// ──────────────────── tests ────────────────────
