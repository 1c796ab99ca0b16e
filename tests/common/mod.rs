#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use filehealth::prelude::*;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
    pub activity_log: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_filehealth") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "filehealth.exe"
    } else {
        "filehealth"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve filehealth binary path for integration test"),
    }
}

/// Run the binary with human output and an isolated activity log.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_format(case_name, args, "human")
}

pub fn run_cli_case_with_format(case_name: &str, args: &[&str], format: &str) -> CmdResult {
    let root = std::env::temp_dir().join("filehealth-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let stem = format!("{}-{}", sanitize(case_name), now_millis());
    let log_path = root.join(format!("{stem}.log"));
    let activity_log = root.join(format!("{stem}.jsonl"));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("FH_OUTPUT_FORMAT", format)
        .env("FH_PATHS_JSONL_LOG", &activity_log)
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute filehealth command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
        activity_log,
    }
}

/// Host metadata I/O with an in-memory attribute store, so attribute
/// policies can be exercised on filesystems without native attributes.
#[derive(Debug, Default)]
pub struct AttributeStore {
    inner: StdMetadataIo,
    attrs: Mutex<HashMap<PathBuf, FileAttributes>>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, path: &Path, attrs: FileAttributes) {
        self.attrs
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), attrs);
    }

    pub fn attributes(&self, path: &Path) -> Option<FileAttributes> {
        self.attrs.lock().unwrap().get(path).copied()
    }
}

impl MetadataIo for AttributeStore {
    fn stat(&self, path: &Path) -> filehealth::core::errors::Result<FileMetadata> {
        let mut meta = self.inner.stat(path)?;
        meta.attributes = Some(self.attributes(path).unwrap_or_else(FileAttributes::empty));
        Ok(meta)
    }

    fn set_attributes(
        &self,
        path: &Path,
        _handle: Option<&File>,
        attrs: FileAttributes,
    ) -> filehealth::core::errors::Result<()> {
        self.mark(path, attrs);
        Ok(())
    }

    fn set_times(
        &self,
        path: &Path,
        handle: Option<&File>,
        update: &TimeUpdate,
    ) -> filehealth::core::errors::Result<()> {
        self.inner.set_times(path, handle, update)
    }

    fn rename(&self, from: &Path, to: &Path) -> filehealth::core::errors::Result<()> {
        self.inner.rename(from, to)?;
        let mut attrs = self.attrs.lock().unwrap();
        if let Some(moved) = attrs.remove(from) {
            attrs.insert(to.to_path_buf(), moved);
        }
        Ok(())
    }
}
