//! Remediation: safe per-file fix execution and its results.

pub mod operation;
pub mod outcome;
