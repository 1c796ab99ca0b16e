//! Handler and issue dispatch: the closed set of policies and the issues they report.

#![allow(missing_docs)]

use std::path::Path;
use std::time::SystemTime;

pub use crate::platform::pal::AccessMode;
use crate::platform::pal::FileMetadata;
use crate::policy::access::ScanAccessIssue;
use crate::policy::attributes::{AttributeHandler, AttributeIssue};
use crate::policy::name::{NameHandler, NameIssue};
use crate::policy::time::{TimeHandler, TimeIssue};
use crate::remediation::operation::Operation;
use crate::remediation::outcome::{Change, Outcome};

/// Read-only view of one file handed to every handler.
///
/// Handlers must decide from this snapshot alone; re-reading the file here
/// would hide exactly the staleness that change detection exists to catch.
#[derive(Debug, Clone, Copy)]
pub struct Examination<'a> {
    pub root: &'a Path,
    /// Path relative to `root`.
    pub path: &'a Path,
    pub index: usize,
    pub metadata: &'a FileMetadata,
    /// Evaluation clock for this file.
    pub now: SystemTime,
}

// ──────────────────── handlers ────────────────────

/// A configured policy that examines metadata and reports issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueHandler {
    Attribute(AttributeHandler),
    Name(NameHandler),
    Time(TimeHandler),
}

impl IssueHandler {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attribute(h) => h.name(),
            Self::Name(h) => h.name(),
            Self::Time(h) => h.name(),
        }
    }

    /// Zero or more issues for the examined file, in a stable order.
    #[must_use]
    pub fn examine(&self, exam: &Examination<'_>) -> Vec<Issue> {
        match self {
            Self::Attribute(h) => h.examine(exam).into_iter().map(Issue::Attribute).collect(),
            Self::Name(h) => h.examine(exam).into_iter().map(Issue::Name).collect(),
            Self::Time(h) => h.examine(exam).into_iter().map(Issue::Time).collect(),
        }
    }
}

impl From<AttributeHandler> for IssueHandler {
    fn from(value: AttributeHandler) -> Self {
        Self::Attribute(value)
    }
}

impl From<NameHandler> for IssueHandler {
    fn from(value: NameHandler) -> Self {
        Self::Name(value)
    }
}

impl From<TimeHandler> for IssueHandler {
    fn from(value: TimeHandler) -> Self {
        Self::Time(value)
    }
}

// ──────────────────── issues ────────────────────

/// A detected policy violation on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    Attribute(AttributeIssue),
    Name(NameIssue),
    Time(TimeIssue),
    ScanAccess(ScanAccessIssue),
}

impl Issue {
    /// The configured handler that produced this issue. Walk failures have none.
    #[must_use]
    pub fn handler(&self) -> Option<IssueHandler> {
        match self {
            Self::Attribute(i) => Some(IssueHandler::Attribute(i.handler)),
            Self::Name(i) => Some(IssueHandler::Name(i.handler)),
            Self::Time(i) => Some(IssueHandler::Time(i.handler)),
            Self::ScanAccess(_) => None,
        }
    }

    #[must_use]
    pub fn handler_name(&self) -> &'static str {
        match self {
            Self::ScanAccess(_) => ScanAccessIssue::HANDLER_NAME,
            other => other.handler().map_or("", |h| h.name()),
        }
    }

    /// Short machine-stable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Attribute(i) => i.summary().to_string(),
            Self::Name(i) => i.summary().to_string(),
            Self::Time(i) => i.summary().to_string(),
            Self::ScanAccess(i) => i.summary().to_string(),
        }
    }

    /// Longer description; empty when the summary says it all.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Attribute(i) => i.description(),
            Self::Name(i) => i.description().to_string(),
            Self::Time(i) => i.description().to_string(),
            Self::ScanAccess(i) => i.description(),
        }
    }

    /// Proposed fix; empty when no fix exists.
    #[must_use]
    pub fn resolution(&self) -> String {
        match self {
            Self::Attribute(i) => i.resolution(),
            Self::Name(i) => i.resolution(),
            Self::Time(i) => i.resolution(),
            Self::ScanAccess(_) => String::new(),
        }
    }

    /// Minimum open permission needed to apply the fix.
    #[must_use]
    pub fn access_mode(&self) -> AccessMode {
        match self {
            Self::Attribute(_) | Self::Time(_) => AccessMode::ReadWrite,
            Self::Name(_) | Self::ScanAccess(_) => AccessMode::ReadOnly,
        }
    }

    /// Apply this issue's fix within `op`.
    pub fn fix(&self, op: &mut Operation<'_>) -> Outcome {
        let (change, result) = match self {
            Self::Attribute(i) => i.fix(op),
            Self::Name(i) => i.fix(op),
            Self::Time(i) => i.fix(op),
            Self::ScanAccess(i) => (Change::None, i.fix()),
        };
        Outcome::new(op.index(), self.clone(), change, result.err())
    }
}

impl From<AttributeIssue> for Issue {
    fn from(value: AttributeIssue) -> Self {
        Self::Attribute(value)
    }
}

impl From<NameIssue> for Issue {
    fn from(value: NameIssue) -> Self {
        Self::Name(value)
    }
}

impl From<TimeIssue> for Issue {
    fn from(value: TimeIssue) -> Self {
        Self::Time(value)
    }
}

impl From<ScanAccessIssue> for Issue {
    fn from(value: ScanAccessIssue) -> Self {
        Self::ScanAccess(value)
    }
}
