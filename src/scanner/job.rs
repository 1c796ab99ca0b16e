//! Background scan job: walks a tree on its own thread and streams results.
//!
//! The job hands each reportable file to the consumer through a single-slot
//! channel, so the walk never runs more than one file ahead of consumption.
//! Every blocking send also watches the job's [`CancelToken`]. Whatever the
//! exit path, the job sends exactly one [`JobUpdate::Finished`] and then drops
//! its sender.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use crossbeam_channel::{self as channel, Receiver, Sender, select};
use walkdir::{DirEntry, WalkDir};

use crate::core::cancel::CancelToken;
use crate::core::errors::{FhError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::platform::pal::MetadataIo;
use crate::policy::access::ScanAccessIssue;
use crate::policy::issue::{Examination, IssueHandler};
use crate::scanner::file::ScannedFile;
use crate::scanner::patterns::PatternFilter;
use crate::scanner::stats::JobStats;

/// Source of "now" for examinations and timestamps.
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// Wall clock.
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(SystemTime::now)
}

// ──────────────────── updates ────────────────────

/// How a job ended.
#[derive(Debug)]
pub enum JobEnd {
    Completed,
    Cancelled,
    /// The root itself could not be walked.
    Failed(FhError),
}

/// Message from the job to its consumer. Stats are a copy taken right after
/// the file was tallied.
#[derive(Debug)]
pub enum JobUpdate {
    File {
        file: ScannedFile,
        stats: JobStats,
        at: SystemTime,
    },
    Finished {
        stats: JobStats,
        at: SystemTime,
        end: JobEnd,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

// ──────────────────── job ────────────────────

/// Everything the worker thread needs, moved into it at spawn.
pub struct ScanJob {
    pub root: PathBuf,
    pub handlers: Vec<IssueHandler>,
    pub filter: PatternFilter,
    pub show_skipped: bool,
    pub show_healthy: bool,
    pub io: Arc<dyn MetadataIo>,
    pub clock: Clock,
    pub logger: Option<ActivityLoggerHandle>,
}

impl ScanJob {
    /// Start the worker. The receiver yields file updates followed by exactly
    /// one `Finished`, then disconnects.
    pub fn spawn(self, cancel: CancelToken) -> Result<(Receiver<JobUpdate>, thread::JoinHandle<()>)> {
        let (tx, rx) = channel::bounded::<JobUpdate>(1);
        let join = thread::Builder::new()
            .name("fh-scan".to_string())
            .spawn(move || self.run(&tx, &cancel))
            .map_err(|e| FhError::Runtime {
                details: format!("failed to spawn scan thread: {e}"),
            })?;
        Ok((rx, join))
    }

    fn run(&self, tx: &Sender<JobUpdate>, cancel: &CancelToken) {
        let start = (self.clock)();
        self.log(|| ActivityEvent::ScanStarted {
            root: self.root.display().to_string(),
        });

        let mut stats = JobStats::default();
        let end = self.walk(tx, cancel, &mut stats);
        let at = (self.clock)();
        self.log_end(&end, stats, start, at);

        // Blocking: the consumer drains until it sees this or drops the receiver.
        let _ = tx.send(JobUpdate::Finished { stats, at, end });
    }

    fn walk(&self, tx: &Sender<JobUpdate>, cancel: &CancelToken, stats: &mut JobStats) -> JobEnd {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();

        for item in walker {
            if cancel.is_cancelled() {
                return JobEnd::Cancelled;
            }

            let depth = match &item {
                Ok(entry) => entry.depth(),
                Err(err) => err.depth(),
            };
            if depth == 0 {
                match item {
                    Ok(_) => continue,
                    Err(err) => {
                        return JobEnd::Failed(FhError::Walk {
                            path: self.root.clone(),
                            details: err.to_string(),
                        });
                    }
                }
            }

            let Some(file) = self.visit(&item, stats) else {
                continue;
            };
            let update = JobUpdate::File {
                file,
                stats: *stats,
                at: (self.clock)(),
            };
            if !send_or_cancel(tx, cancel, update) {
                return JobEnd::Cancelled;
            }
        }
        JobEnd::Completed
    }

    /// Tally one entry and return it if it should be streamed.
    fn visit(&self, item: &walkdir::Result<DirEntry>, stats: &mut JobStats) -> Option<ScannedFile> {
        let full = match item {
            Ok(entry) => entry.path(),
            Err(err) => err.path().unwrap_or(&self.root),
        };
        let relative = full.strip_prefix(&self.root).unwrap_or(full);
        let mut file = ScannedFile::bare(&self.root, relative, stats.visited());

        if self.filter.should_skip(&file.name) {
            stats.skipped += 1;
            file.skipped = true;
            return self.show_skipped.then_some(file);
        }

        stats.scanned += 1;
        match item {
            Err(err) => file.issues.push(ScanAccessIssue::from_walk(err).into()),
            Ok(entry) => self.examine(entry.path(), &mut file),
        }

        if file.is_healthy() {
            stats.healthy += 1;
            self.show_healthy.then_some(file)
        } else {
            stats.unhealthy += 1;
            stats.issues += file.issues.len();
            Some(file)
        }
    }

    fn examine(&self, path: &Path, file: &mut ScannedFile) {
        let metadata = match self.io.stat(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                file.issues.push(ScanAccessIssue::from_stat(&err).into());
                return;
            }
        };
        file.record_metadata(&metadata);
        let exam = Examination {
            root: &self.root,
            path: &file.path,
            index: file.index,
            metadata: &metadata,
            now: (self.clock)(),
        };
        let issues: Vec<_> = self
            .handlers
            .iter()
            .flat_map(|handler| handler.examine(&exam))
            .collect();
        file.issues.extend(issues);
    }

    fn log(&self, event: impl FnOnce() -> ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event());
        }
    }

    fn log_end(&self, end: &JobEnd, stats: JobStats, start: SystemTime, at: SystemTime) {
        let root = self.root.display().to_string();
        let duration_ms = at
            .duration_since(start)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.log(|| match end {
            JobEnd::Completed => ActivityEvent::ScanCompleted {
                root,
                scanned: stats.scanned,
                skipped: stats.skipped,
                unhealthy: stats.unhealthy,
                issues: stats.issues,
                duration_ms,
            },
            JobEnd::Cancelled => ActivityEvent::ScanCancelled {
                root,
                scanned: stats.scanned,
                duration_ms,
            },
            JobEnd::Failed(err) => ActivityEvent::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        });
    }
}

/// Blocking send that gives up when the token fires. Returns false if the
/// update was not delivered.
fn send_or_cancel(tx: &Sender<JobUpdate>, cancel: &CancelToken, update: JobUpdate) -> bool {
    select! {
        send(tx, update) -> res => res.is_ok(),
        recv(cancel.done()) -> _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pal::StdMetadataIo;
    use crate::policy::name::NameHandler;
    use std::fs;

    fn job(root: &Path) -> ScanJob {
        ScanJob {
            root: root.to_path_buf(),
            handlers: vec![NameHandler::default().into()],
            filter: PatternFilter::default(),
            show_skipped: false,
            show_healthy: true,
            io: Arc::new(StdMetadataIo),
            clock: system_clock(),
            logger: None,
        }
    }

    fn drain(rx: &Receiver<JobUpdate>) -> (Vec<ScannedFile>, JobStats, JobEnd) {
        let mut files = Vec::new();
        for update in rx.iter() {
            match update {
                JobUpdate::File { file, .. } => files.push(file),
                JobUpdate::Finished { stats, end, .. } => return (files, stats, end),
            }
        }
        panic!("stream closed without a final update");
    }

    #[test]
    fn walks_in_name_order_and_skips_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b"), b"").unwrap();
        fs::write(dir.path().join("a"), b"").unwrap();
        fs::create_dir(dir.path().join("c")).unwrap();
        fs::write(dir.path().join("c").join("d"), b"").unwrap();

        let (rx, join) = job(dir.path()).spawn(CancelToken::new()).unwrap();
        let (files, stats, end) = drain(&rx);
        join.join().unwrap();

        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("c"),
                PathBuf::from("c/d"),
            ]
        );
        let indexes: Vec<_> = files.iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
        assert_eq!(stats.scanned, 4);
        assert_eq!(stats.healthy, 4);
        assert!(matches!(end, JobEnd::Completed));
    }

    #[test]
    fn skipped_entries_count_toward_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tmp"), b"").unwrap();
        fs::write(dir.path().join("b.txt "), b"").unwrap();
        let mut j = job(dir.path());
        j.filter = PatternFilter::compile(Vec::<String>::new(), [r"\.tmp$"]).unwrap();
        j.show_healthy = false;

        let (rx, join) = j.spawn(CancelToken::new()).unwrap();
        let (files, stats, _) = drain(&rx);
        join.join().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].index, 1);
        assert_eq!(files[0].issues.len(), 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.unhealthy, 1);
        assert_eq!(stats.issues, 1);
    }

    #[test]
    fn show_skipped_streams_marked_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tmp"), b"").unwrap();
        let mut j = job(dir.path());
        j.filter = PatternFilter::compile(Vec::<String>::new(), ["tmp"]).unwrap();
        j.show_skipped = true;

        let (rx, join) = j.spawn(CancelToken::new()).unwrap();
        let (files, stats, _) = drain(&rx);
        join.join().unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].skipped);
        assert_eq!(stats.scanned, 0);
    }

    #[test]
    fn missing_root_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let (rx, join) = job(&dir.path().join("absent"))
            .spawn(CancelToken::new())
            .unwrap();
        let (files, stats, end) = drain(&rx);
        join.join().unwrap();

        assert!(files.is_empty());
        assert_eq!(stats, JobStats::default());
        assert!(matches!(end, JobEnd::Failed(FhError::Walk { .. })));
    }

    #[test]
    fn cancel_while_blocked_on_send_still_finishes() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{i}")), b"").unwrap();
        }
        let cancel = CancelToken::new();
        let (rx, join) = job(dir.path()).spawn(cancel.clone()).unwrap();

        // Take one file, leave the producer blocked, then cancel.
        assert!(matches!(rx.recv().unwrap(), JobUpdate::File { .. }));
        cancel.cancel();
        let (_, stats, end) = drain(&rx);
        join.join().unwrap();

        assert!(matches!(end, JobEnd::Cancelled));
        assert!(stats.scanned >= 1 && stats.scanned < 5);
        assert!(rx.recv().is_err());
    }
}
