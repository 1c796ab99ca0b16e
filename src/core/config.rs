//! Configuration: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{FhError, Result};
use crate::platform::pal::FileAttributes;
use crate::policy::attributes::AttributeHandler;
use crate::policy::issue::IssueHandler;
use crate::policy::name::NameHandler;
use crate::policy::time::TimeHandler;
use crate::scanner::patterns::PatternFilter;

/// Full filehealth configuration model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub attributes: AttributesConfig,
    pub time: TimeConfig,
    pub name: NameConfig,
    pub fix: FixConfig,
    pub paths: PathsConfig,
}

/// What the walk visits and reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Base-name regexes; when non-empty, names matching none are skipped.
    pub include: Vec<String>,
    /// Base-name regexes; a match always skips.
    pub exclude: Vec<String>,
    pub show_skipped: bool,
    pub show_healthy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AttributesConfig {
    pub enabled: bool,
    /// Attribute codes or names, e.g. `["T", "offline"]`.
    pub unwanted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeConfig {
    pub enabled: bool,
    /// RFC 3339 lower bound.
    pub min: Option<String>,
    /// RFC 3339 upper bound. Conflicts with `max_is_now`.
    pub max: Option<String>,
    /// Use the scan start as the upper bound and as the reference time.
    pub max_is_now: bool,
    pub lenience_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NameConfig {
    pub enabled: bool,
    pub trim_space: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FixConfig {
    pub dry_run: bool,
    /// Maximum unhealthy files per fix pass; `0` means unlimited.
    pub batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for AttributesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            unwanted: vec!["T".to_string()],
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min: None,
            max: None,
            max_is_now: true,
            lenience_secs: 24 * 60 * 60,
        }
    }
}

impl Default for NameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trim_space: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[FH-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("filehealth").join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("filehealth")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load from the default or an explicit path, then apply env overrides
    /// and validate.
    ///
    /// A missing file at the default path yields defaults; a missing explicit
    /// path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FhError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(FhError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic FNV-1a hash of the effective config.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Compiled include/exclude filter.
    pub fn filter(&self) -> Result<PatternFilter> {
        PatternFilter::compile(&self.scanner.include, &self.scanner.exclude)
    }

    /// Enabled handlers in their fixed order: attributes, time, name.
    ///
    /// `now` becomes the upper bound and reference time when
    /// `time.max_is_now` is set.
    pub fn handlers(&self, now: SystemTime) -> Result<Vec<IssueHandler>> {
        let mut handlers = Vec::with_capacity(3);
        if self.attributes.enabled {
            handlers.push(AttributeHandler::new(self.unwanted_attributes()?).into());
        }
        if self.time.enabled {
            handlers.push(self.time_handler(now)?.into());
        }
        if self.name.enabled {
            handlers.push(
                NameHandler {
                    trim_space: self.name.trim_space,
                }
                .into(),
            );
        }
        Ok(handlers)
    }

    pub fn unwanted_attributes(&self) -> Result<FileAttributes> {
        self.attributes
            .unwanted
            .iter()
            .try_fold(FileAttributes::empty(), |acc, raw| {
                raw.parse::<FileAttributes>().map(|bits| acc.union(bits))
            })
    }

    pub fn time_handler(&self, now: SystemTime) -> Result<TimeHandler> {
        let mut handler =
            TimeHandler::default().with_lenience(Duration::from_secs(self.time.lenience_secs));
        if let Some(min) = &self.time.min {
            handler = handler.with_min(parse_timestamp("time.min", min)?);
        }
        if let Some(max) = &self.time.max {
            handler = handler.with_max(parse_timestamp("time.max", max)?);
        }
        if self.time.max_is_now {
            handler = handler.with_max(now).with_reference(now);
        }
        Ok(handler)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        set_bool(&mut lookup, "FH_SCANNER_SHOW_SKIPPED", &mut self.scanner.show_skipped)?;
        set_bool(&mut lookup, "FH_SCANNER_SHOW_HEALTHY", &mut self.scanner.show_healthy)?;
        set_u64(&mut lookup, "FH_TIME_LENIENCE_SECS", &mut self.time.lenience_secs)?;
        set_bool(&mut lookup, "FH_TIME_MAX_IS_NOW", &mut self.time.max_is_now)?;
        set_bool(&mut lookup, "FH_FIX_DRY_RUN", &mut self.fix.dry_run)?;
        if let Some(raw) = lookup("FH_FIX_BATCH") {
            self.fix.batch = raw.parse::<usize>().map_err(|error| FhError::ConfigParse {
                context: "env",
                details: format!("FH_FIX_BATCH={raw:?}: {error}"),
            })?;
        }
        if let Some(raw) = lookup("FH_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.filter()?;
        self.unwanted_attributes()?;

        let min = self
            .time
            .min
            .as_deref()
            .map(|raw| parse_timestamp("time.min", raw))
            .transpose()?;
        let max = self
            .time
            .max
            .as_deref()
            .map(|raw| parse_timestamp("time.max", raw))
            .transpose()?;
        if max.is_some() && self.time.max_is_now {
            return Err(FhError::InvalidConfig {
                details: "time.max and time.max_is_now are mutually exclusive".to_string(),
            });
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(FhError::InvalidConfig {
                    details: "time.min must not be later than time.max".to_string(),
                });
            }
        }
        if self.paths.jsonl_log.as_os_str().is_empty() {
            return Err(FhError::InvalidConfig {
                details: "paths.jsonl_log must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_timestamp(field: &str, raw: &str) -> Result<SystemTime> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| SystemTime::from(t.with_timezone(&Utc)))
        .map_err(|error| FhError::InvalidConfig {
            details: format!("{field}={raw:?} is not an RFC 3339 timestamp: {error}"),
        })
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env_bool(name, &raw)?;
    }
    Ok(())
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.parse::<u64>().map_err(|error| FhError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| FhError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
