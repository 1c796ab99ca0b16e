//! Per-issue fix results and batch tallies.

#![allow(missing_docs)]

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

use crate::core::errors::FhError;
use crate::platform::pal::FileAttributes;
use crate::policy::issue::Issue;
use crate::policy::time::{TimeKind, format_time};

/// Before/after values a fix computed. `None` when it failed before computing any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    None,
    Attributes {
        before: FileAttributes,
        after: FileAttributes,
    },
    Name {
        from: PathBuf,
        to: PathBuf,
    },
    Time {
        kind: TimeKind,
        before: SystemTime,
        after: SystemTime,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Fixed,
    DryRun,
    /// The issue has no resolution.
    Skipped,
    Failed,
    /// Not attempted: the pass was cancelled first.
    Cancelled,
}

impl OutcomeStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fixed => "FIXED",
            Self::DryRun => "DRY RUN",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Result of applying one issue's fix.
#[derive(Debug)]
pub struct Outcome {
    pub file_index: usize,
    pub issue_index: usize,
    pub issue: Issue,
    pub change: Change,
    pub error: Option<FhError>,
}

impl Outcome {
    #[must_use]
    pub fn new(
        file_index: usize,
        issue: Issue,
        change: Change,
        error: Option<FhError>,
    ) -> Self {
        Self {
            file_index,
            issue_index: 0,
            issue,
            change,
            error,
        }
    }

    #[must_use]
    pub fn at_issue(mut self, issue_index: usize) -> Self {
        self.issue_index = issue_index;
        self
    }

    #[must_use]
    pub fn status(&self) -> OutcomeStatus {
        match &self.error {
            None => OutcomeStatus::Fixed,
            Some(FhError::DryRun) => OutcomeStatus::DryRun,
            Some(FhError::NoResolution) => OutcomeStatus::Skipped,
            Some(FhError::Cancelled) => OutcomeStatus::Cancelled,
            Some(_) => OutcomeStatus::Failed,
        }
    }

    /// `[file.issue]` traceability tag.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("[{}.{}]", self.file_index, self.issue_index)
    }

    /// The error, excluding the dry-run marker.
    #[must_use]
    pub fn failure(&self) -> Option<&FhError> {
        self.error.as_ref().filter(|err| !err.is_dry_run())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.change {
            Change::None => write!(f, "{}", self.issue.summary())?,
            Change::Attributes { before, after } => {
                write!(f, "attribute change: {before} → {after}")?;
            }
            Change::Name { from, to } => write!(
                f,
                "name change: \"{}\" → \"{}\"",
                from.display(),
                to.display()
            )?,
            Change::Time {
                kind,
                before,
                after,
            } => write!(
                f,
                "{kind}: {} → {}",
                format_time(*before),
                format_time(*after)
            )?,
        }
        if let Some(err) = self.failure() {
            write!(f, ": {err}")?;
        }
        Ok(())
    }
}

/// Tally of outcomes across a fix pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub fixed: usize,
    pub dry_run: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl FixReport {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome.status() {
            OutcomeStatus::Fixed => self.fixed += 1,
            OutcomeStatus::DryRun => self.dry_run += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Cancelled => self.cancelled += 1,
        }
    }

    #[must_use]
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.fixed + self.dry_run + self.skipped + self.failed + self.cancelled
    }
}

impl fmt::Display for FixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fixed, {} dry run, {} skipped, {} failed",
            self.fixed, self.dry_run, self.skipped, self.failed
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}
