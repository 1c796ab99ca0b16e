//! Scanner: the configuration surface that starts scan jobs and runs fixes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::cancel::CancelToken;
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::platform::pal::{MetadataIo, StdMetadataIo};
use crate::policy::issue::IssueHandler;
use crate::remediation::outcome::{Outcome, OutcomeStatus};
use crate::scanner::file::ScannedFile;
use crate::scanner::iter::FileIter;
use crate::scanner::job::{Clock, ScanJob, system_clock};
use crate::scanner::patterns::PatternFilter;
use crate::scanner::stats::Summary;

/// Configured once, then used for any number of scans and fixes.
#[derive(Clone)]
pub struct Scanner {
    handlers: Vec<IssueHandler>,
    filter: PatternFilter,
    show_skipped: bool,
    show_healthy: bool,
    io: Arc<dyn MetadataIo>,
    clock: Clock,
    logger: Option<ActivityLoggerHandle>,
}

impl Scanner {
    /// Host metadata I/O, wall clock, no filter, only unhealthy files streamed.
    pub fn new(handlers: Vec<IssueHandler>) -> Self {
        Self {
            handlers,
            filter: PatternFilter::default(),
            show_skipped: false,
            show_healthy: false,
            io: Arc::new(StdMetadataIo),
            clock: system_clock(),
            logger: None,
        }
    }

    /// Handlers, filter and display flags from `config`, evaluated at `now`.
    pub fn from_config(config: &Config, now: SystemTime) -> Result<Self> {
        Ok(Self::new(config.handlers(now)?)
            .with_filter(config.filter()?)
            .with_show_skipped(config.scanner.show_skipped)
            .with_show_healthy(config.scanner.show_healthy))
    }

    #[must_use]
    pub fn with_filter(mut self, filter: PatternFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_show_skipped(mut self, show: bool) -> Self {
        self.show_skipped = show;
        self
    }

    #[must_use]
    pub fn with_show_healthy(mut self, show: bool) -> Self {
        self.show_healthy = show;
        self
    }

    #[must_use]
    pub fn with_io(mut self, io: Arc<dyn MetadataIo>) -> Self {
        self.io = io;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> SystemTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn handlers(&self) -> &[IssueHandler] {
        &self.handlers
    }

    pub fn filter(&self) -> &PatternFilter {
        &self.filter
    }

    pub fn io(&self) -> &dyn MetadataIo {
        self.io.as_ref()
    }

    pub fn now(&self) -> SystemTime {
        (self.clock)()
    }

    /// Start a background scan of `root` and return its iterator.
    pub fn scan_dir(&self, root: impl AsRef<Path>) -> FileIter {
        FileIter::start(self.job(root.as_ref(), self.show_skipped, self.show_healthy))
    }

    /// Gather up to `limit` unhealthy files (`0` = no limit).
    ///
    /// Reaching the limit stops the walk early and is not an error; the
    /// summary then covers only what was walked.
    pub fn collect_files(
        &self,
        root: impl AsRef<Path>,
        ctx: &CancelToken,
        limit: usize,
    ) -> Result<(Vec<ScannedFile>, Summary)> {
        let mut iter = FileIter::start(self.job(root.as_ref(), false, false));
        let mut files = Vec::new();
        let mut limited = false;
        while iter.scan(ctx) {
            if let Some(file) = iter.take_file() {
                files.push(file);
            }
            if limit > 0 && files.len() >= limit {
                limited = true;
                break;
            }
        }
        iter.close();
        let summary = iter.summary();
        match iter.take_err() {
            Some(err) if !(limited && err.is_cancelled()) => Err(err),
            _ => Ok((files, summary)),
        }
    }

    /// Apply every fix on `file`, logging each outcome.
    ///
    /// Issues left unattempted after `ctx` is cancelled come back as
    /// [`OutcomeStatus::Cancelled`] outcomes.
    pub fn fix(&self, file: &ScannedFile, ctx: &CancelToken) -> Vec<Outcome> {
        let outcomes = file.fix(self.io(), self.now(), ctx);
        self.log_outcomes(file, &outcomes);
        outcomes
    }

    /// Like [`Self::fix`] without writing anything.
    pub fn dry_run(&self, file: &ScannedFile, ctx: &CancelToken) -> Vec<Outcome> {
        let outcomes = file.dry_run(self.io(), self.now(), ctx);
        self.log_outcomes(file, &outcomes);
        outcomes
    }

    fn job(&self, root: &Path, show_skipped: bool, show_healthy: bool) -> ScanJob {
        ScanJob {
            root: PathBuf::from(root),
            handlers: self.handlers.clone(),
            filter: self.filter.clone(),
            show_skipped,
            show_healthy,
            io: Arc::clone(&self.io),
            clock: Arc::clone(&self.clock),
            logger: self.logger.clone(),
        }
    }

    fn log_outcomes(&self, file: &ScannedFile, outcomes: &[Outcome]) {
        let Some(logger) = &self.logger else {
            return;
        };
        let path = file.absolute_path().display().to_string();
        for outcome in outcomes {
            let tag = outcome.tag();
            let event = match outcome.status() {
                OutcomeStatus::Fixed => ActivityEvent::FixApplied {
                    path: path.clone(),
                    tag,
                    change: outcome.to_string(),
                },
                OutcomeStatus::DryRun => ActivityEvent::FixDryRun {
                    path: path.clone(),
                    tag,
                    change: outcome.to_string(),
                },
                OutcomeStatus::Skipped | OutcomeStatus::Cancelled => continue,
                OutcomeStatus::Failed => {
                    let (code, message) = outcome
                        .failure()
                        .map(|err| (err.code().to_string(), err.to_string()))
                        .unwrap_or_default();
                    ActivityEvent::FixFailed {
                        path: path.clone(),
                        tag,
                        error_code: code,
                        error_message: message,
                    }
                }
            };
            logger.send(event);
        }
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("handlers", &self.handlers)
            .field("filter", &self.filter)
            .field("show_skipped", &self.show_skipped)
            .field("show_healthy", &self.show_healthy)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}
