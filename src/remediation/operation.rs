//! Remediation context for one scanned file: lazy handle, change detection, dry run.
//!
//! Every fix must call [`Operation::ensure_unchanged`] before touching the
//! file. The first call compares live name, mode, size (files only), and
//! modification time against the scan snapshot; the answer is cached for the
//! rest of the operation so fixes applied earlier in the same pass do not
//! make later ones look stale.

#![allow(missing_docs)]

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::errors::{FhError, Result};
use crate::platform::pal::{AccessMode, FileMetadata, MetadataIo};
use crate::scanner::file::ScannedFile;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChangeCheck {
    Unchanged,
    Changed,
    Failed { kind: io::ErrorKind, message: String },
}

/// Not shared across files and not safe for concurrent use.
pub struct Operation<'a> {
    scanned: &'a ScannedFile,
    io: &'a dyn MetadataIo,
    now: SystemTime,
    dry_run: bool,
    /// Relative path of the file now; differs from the scan after a rename.
    current: PathBuf,
    handle: Option<File>,
    change_check: Option<ChangeCheck>,
}

impl<'a> Operation<'a> {
    #[must_use]
    pub fn new(
        scanned: &'a ScannedFile,
        io: &'a dyn MetadataIo,
        now: SystemTime,
        dry_run: bool,
    ) -> Self {
        Self {
            scanned,
            io,
            now,
            dry_run,
            current: scanned.path.clone(),
            handle: None,
            change_check: None,
        }
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.scanned.index
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.scanned.root
    }

    /// Relative path at scan time.
    #[must_use]
    pub fn original_path(&self) -> &Path {
        &self.scanned.path
    }

    /// Relative path the file lives at now.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.current
    }

    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.scanned.root.join(&self.current)
    }

    pub(crate) fn set_relative_path(&mut self, path: PathBuf) {
        self.current = path;
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Clock value fixes evaluate policy against.
    #[must_use]
    pub const fn now(&self) -> SystemTime {
        self.now
    }

    #[must_use]
    pub fn io(&self) -> &'a dyn MetadataIo {
        self.io
    }

    /// Union of the permissions every issue of the file needs.
    #[must_use]
    pub fn access_mode(&self) -> AccessMode {
        self.scanned
            .issues
            .iter()
            .map(crate::policy::issue::Issue::access_mode)
            .max()
            .unwrap_or_default()
    }

    /// Whether the file differs from its scan snapshot. Evaluated once.
    pub fn file_changed(&mut self) -> Result<bool> {
        let check = match &self.change_check {
            Some(check) => check.clone(),
            None => {
                let check = self.evaluate_change();
                self.change_check = Some(check.clone());
                check
            }
        };
        match check {
            ChangeCheck::Unchanged => Ok(false),
            ChangeCheck::Changed => Ok(true),
            ChangeCheck::Failed { kind, message } => Err(FhError::io(
                self.current_path(),
                io::Error::new(kind, message),
            )),
        }
    }

    /// `FileChanged` unless the file still matches its snapshot.
    pub fn ensure_unchanged(&mut self) -> Result<()> {
        if self.file_changed()? {
            return Err(FhError::FileChanged {
                path: self.current_path(),
            });
        }
        Ok(())
    }

    fn evaluate_change(&self) -> ChangeCheck {
        match self.io.stat(&self.current_path()) {
            Ok(live) => {
                if self.matches_snapshot(&live) {
                    ChangeCheck::Unchanged
                } else {
                    ChangeCheck::Changed
                }
            }
            Err(FhError::Io { source, .. }) => ChangeCheck::Failed {
                kind: source.kind(),
                message: source.to_string(),
            },
            Err(other) => ChangeCheck::Failed {
                kind: io::ErrorKind::Other,
                message: other.to_string(),
            },
        }
    }

    fn matches_snapshot(&self, live: &FileMetadata) -> bool {
        let scanned = self.scanned;
        live.name == scanned.name
            && live.mode == scanned.mode
            && (scanned.is_dir || live.size == scanned.size)
            && live.modified() == scanned.modified
    }

    /// Fresh metadata for the file's current path.
    pub fn live_metadata(&self) -> Result<FileMetadata> {
        self.io.stat(&self.current_path())
    }

    /// Run `f` with the operation's shared handle, opening it on first use.
    ///
    /// The same handle is passed to every call, so `f` must only perform
    /// metadata operations on it, never positioned reads or writes.
    pub fn with_file<T>(
        &mut self,
        f: impl FnOnce(&File, &Path, &dyn MetadataIo) -> Result<T>,
    ) -> Result<T> {
        let path = self.current_path();
        if self.handle.is_none() {
            self.handle = Some(self.open(&path)?);
        }
        match &self.handle {
            Some(file) => f(file, &path, self.io),
            None => Err(FhError::Runtime {
                details: format!("no handle for {}", path.display()),
            }),
        }
    }

    /// Run `f` with a handle opened just for this call and closed after it.
    pub fn with_file_exclusive<T>(
        &self,
        f: impl FnOnce(&mut File, &Path, &dyn MetadataIo) -> Result<T>,
    ) -> Result<T> {
        let path = self.current_path();
        let mut file = self.open(&path)?;
        f(&mut file, &path, self.io)
    }

    fn open(&self, path: &Path) -> Result<File> {
        self.io.open(path, self.access_mode(), self.scanned.is_dir)
    }

    #[must_use]
    pub const fn has_open_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Release the shared handle. Idempotent.
    pub fn close(&mut self) {
        self.handle = None;
    }
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
