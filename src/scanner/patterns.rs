//! Include/exclude name filter built from regular expressions.
//!
//! Exclusion wins: a name matching any exclude pattern is skipped even when an
//! include pattern also matches. With include patterns configured, a name that
//! matches none of them is skipped. No patterns at all keeps everything.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::core::errors::{FhError, Result};

/// A compiled name pattern. Matches anywhere in the base name unless anchored.
#[derive(Debug, Clone)]
pub struct Pattern {
    expression: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        let expression = Regex::new(source).map_err(|err| FhError::InvalidPattern {
            pattern: source.to_string(),
            details: err.to_string(),
        })?;
        Ok(Self { expression })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.expression.as_str()
    }

    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.expression.is_match(name)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl FromStr for Pattern {
    type Err = FhError;

    fn from_str(source: &str) -> Result<Self> {
        Self::new(source)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision for one base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Excluded,
    NotIncluded,
}

impl FilterDecision {
    #[must_use]
    pub const fn is_skip(self) -> bool {
        !matches!(self, Self::Keep)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternFilter {
    pub include: Vec<Pattern>,
    pub exclude: Vec<Pattern>,
}

impl PatternFilter {
    #[must_use]
    pub const fn new(include: Vec<Pattern>, exclude: Vec<Pattern>) -> Self {
        Self { include, exclude }
    }

    /// Compile both lists, failing on the first invalid expression.
    pub fn compile<I, E, S, T>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let include = include
            .into_iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let exclude = exclude
            .into_iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { include, exclude })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    #[must_use]
    pub fn decide(&self, name: &str) -> FilterDecision {
        if self.exclude.iter().any(|p| p.is_match(name)) {
            return FilterDecision::Excluded;
        }
        if !self.include.is_empty() && !self.include.iter().any(|p| p.is_match(name)) {
            return FilterDecision::NotIncluded;
        }
        FilterDecision::Keep
    }

    #[must_use]
    pub fn should_skip(&self, name: &str) -> bool {
        self.decide(name).is_skip()
    }
}
