//! Running scan tallies and the final summary.

#![allow(missing_docs)]

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;

/// Tallies accumulated by the scan job. Copied into every update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    /// Entries not scanned because of the name filter.
    pub skipped: usize,
    pub scanned: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    /// Total issues across scanned entries.
    pub issues: usize,
}

impl JobStats {
    /// Number of entries visited so far; also the next file index.
    #[must_use]
    pub const fn visited(&self) -> usize {
        self.skipped + self.scanned
    }
}

impl fmt::Display for JobStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} skipped, {} scanned, {} healthy, {} unhealthy, {} issues",
            self.skipped, self.scanned, self.healthy, self.unhealthy, self.issues
        )
    }
}

/// Final statistics with the scan's wall-clock bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub stats: JobStats,
    pub start: SystemTime,
    pub end: SystemTime,
}

impl Summary {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start).unwrap_or_default()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scanned, {} with issues, {} total issues ({})",
            pluralize(self.stats.scanned, "file", "files"),
            pluralize(self.stats.unhealthy, "file", "files"),
            self.stats.issues,
            format_duration(self.duration())
        )
    }
}

#[must_use]
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Compact human duration: `850ms`, `12.3s`, `4m05s`, `1h02m`.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs < 60 {
        return format!("{:.1}s", d.as_secs_f64());
    }
    if secs < 3600 {
        return format!("{}m{:02}s", secs / 60, secs % 60);
    }
    format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_stats_display() {
        let stats = JobStats {
            skipped: 1,
            scanned: 5,
            healthy: 3,
            unhealthy: 2,
            issues: 4,
        };
        assert_eq!(
            stats.to_string(),
            "1 skipped, 5 scanned, 3 healthy, 2 unhealthy, 4 issues"
        );
        assert_eq!(stats.visited(), 6);
    }

    #[test]
    fn summary_pluralizes() {
        let start = SystemTime::UNIX_EPOCH;
        let summary = Summary {
            stats: JobStats {
                scanned: 1,
                unhealthy: 2,
                issues: 3,
                ..JobStats::default()
            },
            start,
            end: start + Duration::from_millis(250),
        };
        assert_eq!(
            summary.to_string(),
            "1 file scanned, 2 files with issues, 3 total issues (250ms)"
        );
    }

    #[test]
    fn summary_duration_never_negative() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let summary = Summary {
            stats: JobStats::default(),
            start,
            end: SystemTime::UNIX_EPOCH,
        };
        assert_eq!(summary.duration(), Duration::ZERO);
    }

    #[test]
    fn duration_formats() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(12_340)), "12.3s");
        assert_eq!(format_duration(Duration::from_secs(245)), "4m05s");
        assert_eq!(format_duration(Duration::from_secs(3_720)), "1h02m");
    }
}
