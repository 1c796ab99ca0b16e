//! FH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FhError>;

/// Top-level error type for filehealth.
#[derive(Debug, Error)]
pub enum FhError {
    #[error("[FH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FH-1004] invalid pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("[FH-2001] the file has changed since it was examined: {path}")]
    FileChanged { path: PathBuf },

    #[error("[FH-2002] destination already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("[FH-2003] unsupported on this file: {path}: {details}")]
    Unsupported { path: PathBuf, details: String },

    #[error("[FH-2004] no resolution available for this issue")]
    NoResolution,

    #[error("[FH-2005] dry run")]
    DryRun,

    #[error("[FH-2006] operation cancelled")]
    Cancelled,

    #[error("[FH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FH-3001] directory walk failure at {path}: {details}")]
    Walk { path: PathBuf, details: String },

    #[error("[FH-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FH-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[FH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl FhError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FH-1001",
            Self::MissingConfig { .. } => "FH-1002",
            Self::ConfigParse { .. } => "FH-1003",
            Self::InvalidPattern { .. } => "FH-1004",
            Self::FileChanged { .. } => "FH-2001",
            Self::AlreadyExists { .. } => "FH-2002",
            Self::Unsupported { .. } => "FH-2003",
            Self::NoResolution => "FH-2004",
            Self::DryRun => "FH-2005",
            Self::Cancelled => "FH-2006",
            Self::Serialization { .. } => "FH-2101",
            Self::Walk { .. } => "FH-3001",
            Self::Io { .. } => "FH-3002",
            Self::ChannelClosed { .. } => "FH-3003",
            Self::Runtime { .. } => "FH-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// A changed file is not retryable: it has to be re-scanned
    /// before any fix is attempted again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Walk { .. } | Self::ChannelClosed { .. } | Self::Runtime { .. }
        )
    }

    /// Whether this is the dry-run marker rather than a real failure.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }

    /// Whether this reports cancellation rather than a real failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for unsupported metadata operations.
    #[must_use]
    pub fn unsupported(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::Unsupported {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for FhError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FhError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<regex::Error> for FhError {
    fn from(value: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: String::new(),
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for FhError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
