//! Pull-based consumer side of a scan job.

#![allow(missing_docs)]

use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, select};

use crate::core::cancel::CancelToken;
use crate::core::errors::FhError;
use crate::scanner::file::ScannedFile;
use crate::scanner::job::{JobEnd, JobState, JobUpdate, ScanJob};
use crate::scanner::stats::{JobStats, Summary};

/// Iterates the files a background scan job streams.
///
/// ```rust,no_run
/// use filehealth::prelude::*;
///
/// let scanner = Scanner::new(Vec::new());
/// let ctx = CancelToken::never();
/// let mut files = scanner.scan_dir("/data");
/// while files.scan(&ctx) {
///     if let Some(file) = files.file() {
///         println!("{file}");
///     }
/// }
/// println!("{}", files.summary());
/// ```
pub struct FileIter {
    rx: Option<Receiver<JobUpdate>>,
    job_cancel: CancelToken,
    worker: Option<thread::JoinHandle<()>>,
    current: Option<ScannedFile>,
    stats: JobStats,
    start: SystemTime,
    updated: SystemTime,
    state: JobState,
    err: Option<FhError>,
}

impl FileIter {
    pub(crate) fn start(job: ScanJob) -> Self {
        let start = (job.clock)();
        let cancel = CancelToken::new();
        let mut iter = Self {
            rx: None,
            job_cancel: cancel.clone(),
            worker: None,
            current: None,
            stats: JobStats::default(),
            start,
            updated: start,
            state: JobState::Idle,
            err: None,
        };
        match job.spawn(cancel) {
            Ok((rx, worker)) => {
                iter.rx = Some(rx);
                iter.worker = Some(worker);
                iter.state = JobState::Running;
            }
            Err(err) => {
                iter.state = JobState::Failed;
                iter.err = Some(err);
            }
        }
        iter
    }

    /// Advance to the next streamed file. Blocks until one arrives, the job
    /// ends, or `ctx` is cancelled. Returns false once there are no more files;
    /// [`Self::err`] then tells why.
    pub fn scan(&mut self, ctx: &CancelToken) -> bool {
        self.current = None;
        if self.rx.is_none() {
            return false;
        }
        if ctx.is_cancelled() {
            self.abort();
            return false;
        }

        let Some(update) = self.next_update(ctx) else {
            self.abort();
            return false;
        };

        match update {
            Some(JobUpdate::File { file, stats, at }) => {
                self.current = Some(file);
                self.stats = stats;
                self.updated = at;
                true
            }
            Some(JobUpdate::Finished { stats, at, end }) => {
                self.finish(stats, at, end);
                false
            }
            None => {
                self.finish_lost();
                false
            }
        }
    }

    /// The file from the last successful `scan`. Cleared by the next call.
    pub fn file(&self) -> Option<&ScannedFile> {
        self.current.as_ref()
    }

    /// Take ownership of the current file.
    pub fn take_file(&mut self) -> Option<ScannedFile> {
        self.current.take()
    }

    /// Drain the job as an iterator of owned files, with no external
    /// cancellation. Stats and errors are not observable afterwards; use
    /// [`Self::scan`] when they matter.
    pub fn files(mut self) -> impl Iterator<Item = ScannedFile> {
        let ctx = CancelToken::never();
        std::iter::from_fn(move || {
            if self.scan(&ctx) {
                self.take_file()
            } else {
                None
            }
        })
    }

    /// Statistics as of the last update received.
    pub fn stats(&self) -> JobStats {
        self.stats
    }

    /// Time between job start and the last update received.
    pub fn duration(&self) -> Duration {
        self.updated.duration_since(self.start).unwrap_or_default()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            stats: self.stats,
            start: self.start,
            end: self.updated,
        }
    }

    /// `None` after a graceful finish; the walk failure or `Cancelled`
    /// otherwise. Also `None` while the job is still running.
    pub fn err(&self) -> Option<&FhError> {
        self.err.as_ref()
    }

    /// Move the terminal error out.
    pub fn take_err(&mut self) -> Option<FhError> {
        self.err.take()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Stop the job. Safe to call repeatedly and after natural completion.
    pub fn close(&mut self) {
        self.current = None;
        if self.rx.is_some() {
            self.abort();
        }
    }

    // ──────────────────── internals ────────────────────

    /// `None` when `ctx` fired first; `Some(None)` when the stream closed.
    fn next_update(&self, ctx: &CancelToken) -> Option<Option<JobUpdate>> {
        let rx = self.rx.as_ref()?;
        select! {
            recv(rx) -> msg => Some(msg.ok()),
            recv(ctx.done()) -> _ => None,
        }
    }

    /// Cancel the job, drain to its final update, and join it.
    fn abort(&mut self) {
        self.job_cancel.cancel();
        let Some(rx) = self.rx.as_ref() else {
            return;
        };
        let mut finished = None;
        for update in rx.iter() {
            match update {
                JobUpdate::File { stats, at, .. } => {
                    self.stats = stats;
                    self.updated = at;
                }
                JobUpdate::Finished { stats, at, end } => {
                    finished = Some((stats, at, end));
                    break;
                }
            }
        }
        match finished {
            // The job may have ended on its own just before the cancel landed.
            Some((stats, at, JobEnd::Completed)) => {
                self.finish(stats, at, JobEnd::Cancelled);
            }
            Some((stats, at, end)) => self.finish(stats, at, end),
            None => self.finish_lost(),
        }
    }

    fn finish(&mut self, stats: JobStats, at: SystemTime, end: JobEnd) {
        self.stats = stats;
        self.updated = at;
        let (state, err) = match end {
            JobEnd::Completed => (JobState::Completed, None),
            JobEnd::Cancelled => (JobState::Cancelled, Some(FhError::Cancelled)),
            JobEnd::Failed(err) => (JobState::Failed, Some(err)),
        };
        self.state = state;
        self.err = err;
        self.release();
    }

    /// The stream closed without a final update: the worker died.
    fn finish_lost(&mut self) {
        self.state = JobState::Failed;
        self.err = Some(FhError::ChannelClosed {
            component: "scan job",
        });
        self.release();
    }

    fn release(&mut self) {
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                eprintln!("[FH-SCANNER] scan thread panicked");
            }
        }
    }
}

impl Drop for FileIter {
    fn drop(&mut self) {
        self.close();
    }
}
