//! Malformed file names.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use crate::core::errors::{FhError, Result};
use crate::policy::issue::Examination;
use crate::remediation::operation::Operation;
use crate::remediation::outcome::Change;

/// Flags names that change under the cleaning transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameHandler {
    pub trim_space: bool,
}

impl Default for NameHandler {
    fn default() -> Self {
        Self { trim_space: true }
    }
}

impl NameHandler {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        "File Name Issue Handler"
    }

    /// Cleaned form of `name`. Idempotent.
    #[must_use]
    pub fn clean<'a>(&self, name: &'a str) -> &'a str {
        if self.trim_space { name.trim() } else { name }
    }

    #[must_use]
    pub fn examine(&self, exam: &Examination<'_>) -> Option<NameIssue> {
        let original = exam.metadata.name.as_str();
        let cleaned = self.clean(original);
        // A name made only of spaces has nothing left to rename to.
        if cleaned == original || cleaned.is_empty() {
            return None;
        }
        Some(NameIssue {
            original_name: original.to_string(),
            new_name: cleaned.to_string(),
            handler: *self,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameIssue {
    pub original_name: String,
    pub new_name: String,
    pub handler: NameHandler,
}

impl NameIssue {
    #[must_use]
    pub const fn summary(&self) -> &'static str {
        "file name"
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        "leading or trailing space"
    }

    #[must_use]
    pub fn resolution(&self) -> String {
        format!("\"{}\" → \"{}\"", self.original_name, self.new_name)
    }

    pub(crate) fn fix(&self, op: &mut Operation<'_>) -> (Change, Result<()>) {
        if let Err(err) = op.ensure_unchanged() {
            return (Change::None, Err(err));
        }

        let relative = op.relative_path().to_path_buf();
        let renamed = relative
            .parent()
            .map_or_else(|| PathBuf::from(&self.new_name), |dir| dir.join(&self.new_name));
        let from = match absolute(&op.root().join(&relative)) {
            Ok(path) => path,
            Err(err) => return (Change::None, Err(err)),
        };
        let to = match absolute(&op.root().join(&renamed)) {
            Ok(path) => path,
            Err(err) => return (Change::None, Err(err)),
        };
        let change = Change::Name {
            from: from.clone(),
            to: to.clone(),
        };

        match op.io().exists(&to) {
            Ok(false) => {}
            Ok(true) => return (change, Err(FhError::AlreadyExists { path: to })),
            Err(err) => return (change, Err(err)),
        }

        if op.is_dry_run() {
            return (change, Err(FhError::DryRun));
        }

        // The move must not race our own open handle.
        op.close();
        if let Err(err) = op.io().rename(&from, &to) {
            return (change, Err(err));
        }
        op.set_relative_path(renamed);
        (change, Ok(()))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| FhError::io(path, source))
}
