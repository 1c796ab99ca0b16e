//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use filehealth::prelude::*;
//! ```

// Core
pub use crate::core::cancel::CancelToken;
pub use crate::core::config::Config;
pub use crate::core::errors::{FhError, Result};

// Platform
pub use crate::platform::pal::{
    AccessMode, FileAttributes, FileMetadata, FileTimes, MetadataIo, StdMetadataIo, TimeUpdate,
};

// Policy
pub use crate::policy::access::ScanAccessIssue;
pub use crate::policy::attributes::{AttributeHandler, AttributeIssue};
pub use crate::policy::issue::{Examination, Issue, IssueHandler};
pub use crate::policy::name::{NameHandler, NameIssue};
pub use crate::policy::time::{TimeHandler, TimeIssue, TimeKind};

// Remediation
pub use crate::remediation::operation::Operation;
pub use crate::remediation::outcome::{Change, FixReport, Outcome, OutcomeStatus};

// Scanner
pub use crate::scanner::engine::Scanner;
pub use crate::scanner::file::ScannedFile;
pub use crate::scanner::iter::FileIter;
pub use crate::scanner::job::JobState;
pub use crate::scanner::patterns::{Pattern, PatternFilter};
pub use crate::scanner::stats::{JobStats, Summary};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
