//! Implausible timestamps.
//!
//! Bounds are optional. When a reference time is set, both bounds move forward
//! by however long has passed since the reference, so a long scan does not
//! start flagging files written after it began. Lenience widens both bounds
//! to absorb clock skew; a timestamp exactly on a widened bound is accepted.
//!
//! Correction prefers a sibling timestamp of the same file that is itself
//! acceptable, and only clamps to the nearest adjusted bound when none is.

#![allow(missing_docs)]

use std::fmt;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{FhError, Result};
use crate::platform::pal::{FileTimes, TimeUpdate};
use crate::policy::issue::Examination;
use crate::remediation::operation::Operation;
use crate::remediation::outcome::Change;

/// Display format for timestamps in descriptions and outcomes.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Windows FILETIME zero (1601-01-01) expressed as seconds before the Unix epoch.
const FILETIME_EPOCH_OFFSET_SECS: u64 = 11_644_473_600;

#[must_use]
pub fn format_time(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).format(TIME_FORMAT).to_string()
}

/// Which timestamp field an issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeKind {
    Created,
    Accessed,
    Modified,
    Changed,
}

impl TimeKind {
    pub const ALL: [Self; 4] = [Self::Created, Self::Accessed, Self::Modified, Self::Changed];

    #[must_use]
    pub const fn get(self, times: &FileTimes) -> Option<SystemTime> {
        match self {
            Self::Created => times.created,
            Self::Accessed => times.accessed,
            Self::Modified => times.modified,
            Self::Changed => times.changed,
        }
    }

    /// Siblings tried, in order, when this field needs a replacement value.
    const fn fallback_order(self) -> [Self; 3] {
        match self {
            Self::Created => [Self::Modified, Self::Accessed, Self::Changed],
            Self::Accessed => [Self::Modified, Self::Created, Self::Changed],
            Self::Modified => [Self::Created, Self::Accessed, Self::Changed],
            Self::Changed => [Self::Modified, Self::Accessed, Self::Created],
        }
    }

    fn update(self, value: SystemTime) -> TimeUpdate {
        let mut update = TimeUpdate::default();
        match self {
            Self::Created => update.created = Some(value),
            Self::Accessed => update.accessed = Some(value),
            Self::Modified => update.modified = Some(value),
            Self::Changed => update.changed = Some(value),
        }
        update
    }
}

impl fmt::Display for TimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "creation time",
            Self::Accessed => "access time",
            Self::Modified => "mod time",
            Self::Changed => "change time",
        })
    }
}

/// Timestamp policy. Every evaluation takes `now` explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeHandler {
    pub min: Option<SystemTime>,
    pub max: Option<SystemTime>,
    pub reference: Option<SystemTime>,
    pub lenience: Duration,
}

impl TimeHandler {
    #[must_use]
    pub const fn with_min(mut self, min: SystemTime) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub const fn with_max(mut self, max: SystemTime) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub const fn with_reference(mut self, reference: SystemTime) -> Self {
        self.reference = Some(reference);
        self
    }

    #[must_use]
    pub const fn with_lenience(mut self, lenience: Duration) -> Self {
        self.lenience = lenience;
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        "File Timestamp Issue Handler"
    }

    /// One issue per exposed timestamp field that fails the policy.
    #[must_use]
    pub fn examine(&self, exam: &Examination<'_>) -> Vec<TimeIssue> {
        let times = &exam.metadata.times;
        TimeKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let time = kind.get(times)?;
                if self.is_ok(time, exam.now) {
                    return None;
                }
                Some(TimeIssue {
                    kind,
                    time,
                    fallback: self.select_fallback(kind, times, exam.now),
                    examined_at: exam.now,
                    handler: *self,
                })
            })
            .collect()
    }

    /// `bound` shifted by the time elapsed since the reference, if any.
    fn adjust(&self, bound: SystemTime, now: SystemTime) -> SystemTime {
        let Some(reference) = self.reference else {
            return bound;
        };
        match now.duration_since(reference) {
            Ok(ahead) => bound.checked_add(ahead).unwrap_or(bound),
            Err(behind) => bound.checked_sub(behind.duration()).unwrap_or(bound),
        }
    }

    /// Adjusted maximum, or `now` when unbounded.
    #[must_use]
    pub fn adjusted_max(&self, now: SystemTime) -> SystemTime {
        self.max.map_or(now, |max| self.adjust(max, now))
    }

    /// Adjusted minimum, or `now` when unbounded.
    #[must_use]
    pub fn adjusted_min(&self, now: SystemTime) -> SystemTime {
        self.min.map_or(now, |min| self.adjust(min, now))
    }

    fn after_max(&self, t: SystemTime, now: SystemTime) -> bool {
        self.max.is_some_and(|max| {
            self.adjust(max, now)
                .checked_add(self.lenience)
                .is_some_and(|limit| t > limit)
        })
    }

    fn before_min(&self, t: SystemTime, now: SystemTime) -> bool {
        self.min.is_some_and(|min| {
            self.adjust(min, now)
                .checked_sub(self.lenience)
                .is_some_and(|limit| t < limit)
        })
    }

    /// Set and within the lenience-widened, reference-adjusted bounds.
    #[must_use]
    pub fn is_ok(&self, t: SystemTime, now: SystemTime) -> bool {
        !is_unset(t) && !self.after_max(t, now) && !self.before_min(t, now)
    }

    fn select_fallback(
        &self,
        kind: TimeKind,
        times: &FileTimes,
        now: SystemTime,
    ) -> Option<SystemTime> {
        kind.fallback_order()
            .into_iter()
            .filter_map(|sibling| sibling.get(times))
            .find(|t| self.is_ok(*t, now))
    }

    /// The value a fix writes for `t`: unchanged when acceptable, otherwise an
    /// acceptable fallback, otherwise the nearest adjusted bound.
    #[must_use]
    pub fn corrected(
        &self,
        t: SystemTime,
        fallback: Option<SystemTime>,
        now: SystemTime,
    ) -> SystemTime {
        if self.is_ok(t, now) {
            return t;
        }
        if let Some(fallback) = fallback.filter(|f| self.is_ok(*f, now)) {
            return fallback;
        }
        if self.after_max(t, now) {
            self.adjusted_max(now)
        } else {
            self.adjusted_min(now)
        }
    }
}

/// Zero or unset timestamps, as reported by Unix or Windows.
fn is_unset(t: SystemTime) -> bool {
    t == SystemTime::UNIX_EPOCH
        || SystemTime::UNIX_EPOCH
            .checked_sub(Duration::from_secs(FILETIME_EPOCH_OFFSET_SECS))
            .is_some_and(|zero| t == zero)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeIssue {
    pub kind: TimeKind,
    pub time: SystemTime,
    /// Acceptable sibling timestamp at examination time, if any.
    pub fallback: Option<SystemTime>,
    /// Clock value the examination ran with; used for the resolution preview.
    pub examined_at: SystemTime,
    pub handler: TimeHandler,
}

impl TimeIssue {
    #[must_use]
    pub fn summary(&self) -> String {
        self.kind.to_string()
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        ""
    }

    #[must_use]
    pub fn resolution(&self) -> String {
        let proposed = self
            .handler
            .corrected(self.time, self.fallback, self.examined_at);
        if proposed == self.time {
            return String::new();
        }
        format!("{} → {}", format_time(self.time), format_time(proposed))
    }

    pub(crate) fn fix(&self, op: &mut Operation<'_>) -> (Change, Result<()>) {
        if let Err(err) = op.ensure_unchanged() {
            return (Change::None, Err(err));
        }

        let live = match op.live_metadata() {
            Ok(meta) => meta,
            Err(err) => return (Change::None, Err(err)),
        };
        let Some(current) = self.kind.get(&live.times) else {
            return (
                Change::None,
                Err(FhError::unsupported(
                    op.current_path(),
                    format!("{} is not available", self.kind),
                )),
            );
        };
        let corrected = self.handler.corrected(current, self.fallback, op.now());
        let change = Change::Time {
            kind: self.kind,
            before: current,
            after: corrected,
        };

        if op.is_dry_run() {
            return (change, Err(FhError::DryRun));
        }
        if corrected == current {
            return (change, Ok(()));
        }
        let update = self.kind.update(corrected);
        let result = op.with_file(|file, path, io| io.set_times(path, Some(file), &update));
        (change, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pal::FileMetadata;
    use proptest::prelude::*;
    use std::path::Path;

    const HOUR: Duration = Duration::from_secs(3600);
    const DAY: Duration = Duration::from_secs(86_400);

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn examine(handler: TimeHandler, times: FileTimes, now: SystemTime) -> Vec<TimeIssue> {
        let meta = FileMetadata {
            name: "f".to_string(),
            size: 0,
            mode: 0,
            is_dir: false,
            times,
            attributes: None,
        };
        handler.examine(&Examination {
            root: Path::new("/"),
            path: Path::new("f"),
            index: 0,
            metadata: &meta,
            now,
        })
    }

    fn modified_only(t: SystemTime) -> FileTimes {
        FileTimes {
            modified: Some(t),
            ..FileTimes::default()
        }
    }

    #[test]
    fn in_bounds_times_produce_no_issues() {
        let now = at(1_700_000_000);
        let handler = TimeHandler::default()
            .with_min(at(1_000_000_000))
            .with_max(now)
            .with_lenience(DAY);
        let times = FileTimes {
            created: Some(at(1_600_000_000)),
            accessed: Some(now),
            modified: Some(at(1_650_000_000)),
            changed: None,
        };
        assert!(examine(handler, times, now).is_empty());
    }

    #[test]
    fn unset_time_is_always_flagged() {
        let now = at(1_700_000_000);
        let issues = examine(TimeHandler::default(), modified_only(SystemTime::UNIX_EPOCH), now);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].summary(), "mod time");
    }

    #[test]
    fn max_bound_is_inclusive_at_lenience() {
        let now = at(1_700_000_000);
        let handler = TimeHandler::default().with_max(now).with_lenience(DAY);
        assert!(handler.is_ok(now + DAY, now));
        assert!(!handler.is_ok(now + DAY + Duration::from_secs(1), now));
        assert!(!handler.is_ok(now + DAY + DAY, now));
    }

    #[test]
    fn min_bound_is_inclusive_at_lenience() {
        let now = at(1_700_000_000);
        let min = at(1_000_000_000);
        let handler = TimeHandler::default().with_min(min).with_lenience(HOUR);
        assert!(handler.is_ok(min - HOUR, now));
        assert!(!handler.is_ok(min - HOUR - HOUR, now));
    }

    #[test]
    fn reference_shifts_bounds_by_elapsed_time() {
        let start = at(1_700_000_000);
        let handler = TimeHandler::default().with_max(start).with_reference(start);
        let later = start + HOUR;
        // A file written half an hour into the scan is fine an hour in.
        assert!(handler.is_ok(start + HOUR / 2, later));
        assert!(!handler.is_ok(start + HOUR / 2, start));
        assert_eq!(handler.adjusted_max(later), later);
    }

    #[test]
    fn future_access_time_is_flagged_with_sane_write_time() {
        let now = at(1_700_000_000);
        let handler = TimeHandler::default().with_max(now).with_lenience(DAY);
        let good_write = at(1_650_000_000);
        let times = FileTimes {
            created: None,
            accessed: Some(now + DAY * 365),
            modified: Some(good_write),
            changed: None,
        };
        let issues = examine(handler, times, now);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, TimeKind::Accessed);
        assert_eq!(issues[0].fallback, Some(good_write));
    }

    #[test]
    fn correction_prefers_acceptable_sibling() {
        let now = at(1_700_000_000);
        let handler = TimeHandler::default().with_max(now).with_lenience(DAY);
        let good_write = at(1_650_000_000);
        let times = FileTimes {
            created: Some(now + DAY * 30),
            accessed: Some(now),
            modified: Some(good_write),
            changed: None,
        };
        let issues = examine(handler, times, now);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, TimeKind::Created);
        assert_eq!(issues[0].fallback, Some(good_write));
        assert_eq!(
            handler.corrected(issues[0].time, issues[0].fallback, now),
            good_write
        );
        assert_eq!(
            issues[0].resolution(),
            format!("{} → {}", format_time(now + DAY * 30), format_time(good_write))
        );
    }

    #[test]
    fn correction_clamps_without_usable_sibling() {
        let now = at(1_700_000_000);
        let min = at(1_000_000_000);
        let handler = TimeHandler::default().with_min(min).with_max(now);
        assert_eq!(handler.corrected(now + DAY, None, now), now);
        assert_eq!(handler.corrected(at(5), None, now), min);
        assert_eq!(handler.corrected(SystemTime::UNIX_EPOCH, None, now), min);
        // Unusable fallback is ignored.
        assert_eq!(handler.corrected(now + DAY, Some(now + DAY), now), now);
    }

    #[test]
    fn unset_time_without_min_falls_back_to_now() {
        let now = at(1_700_000_000);
        let handler = TimeHandler::default();
        assert_eq!(handler.corrected(SystemTime::UNIX_EPOCH, None, now), now);
    }

    #[test]
    fn kinds_display_their_field_names() {
        assert_eq!(TimeKind::Created.to_string(), "creation time");
        assert_eq!(TimeKind::Accessed.to_string(), "access time");
        assert_eq!(TimeKind::Modified.to_string(), "mod time");
        assert_eq!(TimeKind::Changed.to_string(), "change time");
    }

    #[test]
    fn format_time_is_utc() {
        assert_eq!(format_time(at(0)), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_time(at(1_700_000_000)), "2023-11-14 22:13:20 UTC");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn reference_shift_commutes_with_bound_shift(
            shift in 0u64..10_000_000,
            offset in 0u64..20_000_000,
            lenience in 0u64..100_000,
        ) {
            let now = at(1_700_000_000);
            let min = at(1_500_000_000);
            let max = at(1_600_000_000);
            let reference = at(1_550_000_000);
            let d = Duration::from_secs(shift);
            let lenience = Duration::from_secs(lenience);
            let t = at(1_490_000_000 + offset);

            let moved_reference = TimeHandler::default()
                .with_min(min)
                .with_max(max)
                .with_reference(reference - d)
                .with_lenience(lenience);
            let moved_bounds = TimeHandler::default()
                .with_min(min + d)
                .with_max(max + d)
                .with_reference(reference)
                .with_lenience(lenience);

            prop_assert_eq!(moved_reference.is_ok(t, now), moved_bounds.is_ok(t, now));
            prop_assert_eq!(moved_reference.adjusted_max(now), moved_bounds.adjusted_max(now));
            prop_assert_eq!(moved_reference.adjusted_min(now), moved_bounds.adjusted_min(now));
        }

        #[test]
        fn corrected_value_is_acceptable(offset in 0u64..2_000_000_000) {
            let now = at(1_700_000_000);
            let handler = TimeHandler::default()
                .with_min(at(1_000_000_000))
                .with_max(now)
                .with_lenience(DAY);
            let fixed = handler.corrected(at(offset), None, now);
            prop_assert!(handler.is_ok(fixed, now));
        }
    }
}
