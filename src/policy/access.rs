//! Synthetic issue for entries the walk could not read.

#![allow(missing_docs)]

use std::io;

use crate::core::errors::{FhError, Result};

/// A walk or stat failure recorded against the entry instead of aborting the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanAccessIssue {
    /// What was being attempted (`read`, `stat`, `loop`).
    pub op: String,
    pub message: String,
    pub kind: io::ErrorKind,
}

impl ScanAccessIssue {
    pub const HANDLER_NAME: &'static str = "File Access";

    #[must_use]
    pub fn new(op: impl Into<String>, err: &io::Error) -> Self {
        Self {
            op: op.into(),
            message: err.to_string(),
            kind: err.kind(),
        }
    }

    /// From a walk failure. Symlink loops carry no I/O error of their own.
    #[must_use]
    pub fn from_walk(err: &walkdir::Error) -> Self {
        if let Some(io_err) = err.io_error() {
            return Self::new("read", io_err);
        }
        Self {
            op: "loop".to_string(),
            message: err.to_string(),
            kind: io::ErrorKind::Other,
        }
    }

    /// From a failed metadata read on an entry the walk did reach.
    #[must_use]
    pub fn from_stat(err: &FhError) -> Self {
        match err {
            FhError::Io { source, .. } => Self::new("stat", source),
            other => Self {
                op: "stat".to_string(),
                message: other.to_string(),
                kind: io::ErrorKind::Other,
            },
        }
    }

    #[must_use]
    pub const fn summary(&self) -> &'static str {
        "access failure"
    }

    #[must_use]
    pub fn description(&self) -> String {
        format!("{}: {}", self.op, self.message)
    }

    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.kind == io::ErrorKind::PermissionDenied
    }

    /// Access failures cannot be fixed by the engine.
    pub(crate) const fn fix(&self) -> Result<()> {
        Err(FhError::NoResolution)
    }
}
