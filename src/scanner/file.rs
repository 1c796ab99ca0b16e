//! One visited filesystem entry and its issues.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::cancel::CancelToken;
use crate::core::errors::FhError;
use crate::platform::pal::{FileMetadata, MetadataIo};
use crate::policy::issue::Issue;
use crate::remediation::operation::Operation;
use crate::remediation::outcome::{Change, Outcome};

/// A scanned entry. Only the fields change detection needs are kept.
///
/// Handed out by value; remediation works on the copy it was given, so what a
/// consumer re-reads always matches what was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub root: PathBuf,
    /// Path relative to `root`.
    pub path: PathBuf,
    pub index: usize,
    pub skipped: bool,
    pub name: String,
    pub size: u64,
    pub mode: u32,
    pub is_dir: bool,
    pub modified: SystemTime,
    pub issues: Vec<Issue>,
}

impl ScannedFile {
    /// Entry with no metadata yet (skipped or unreadable).
    #[must_use]
    pub fn bare(root: &Path, path: &Path, index: usize) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            root: root.to_path_buf(),
            path: path.to_path_buf(),
            index,
            skipped: false,
            name,
            size: 0,
            mode: 0,
            is_dir: false,
            modified: SystemTime::UNIX_EPOCH,
            issues: Vec::new(),
        }
    }

    pub fn record_metadata(&mut self, meta: &FileMetadata) {
        self.name.clone_from(&meta.name);
        self.size = meta.size;
        self.mode = meta.mode;
        self.is_dir = meta.is_dir;
        self.modified = meta.modified();
    }

    #[must_use]
    pub fn absolute_path(&self) -> PathBuf {
        self.root.join(&self.path)
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    /// One line per issue: `[file.issue] summary: "path": description: (fix: resolution)`.
    /// Empty when the file has no issues.
    #[must_use]
    pub fn description(&self) -> String {
        let path = self.path.display();
        self.issues
            .iter()
            .enumerate()
            .map(|(i, issue)| {
                let mut line = format!("[{}.{i}] {}: \"{path}\"", self.index, issue.summary());
                let desc = issue.description();
                if !desc.is_empty() {
                    line.push_str(": ");
                    line.push_str(&desc);
                }
                let resolution = issue.resolution();
                if !resolution.is_empty() {
                    line.push_str(&format!(": (fix: {resolution})"));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Apply every issue's fix in order inside one operation.
    ///
    /// Always returns one outcome per issue. Once `ctx` is cancelled, the
    /// issues not yet attempted report [`FhError::Cancelled`]; outcomes of
    /// fixes already applied are kept.
    pub fn fix(&self, io: &dyn MetadataIo, now: SystemTime, ctx: &CancelToken) -> Vec<Outcome> {
        self.run(io, now, ctx, false)
    }

    /// Same as [`Self::fix`] but stops short of every write.
    pub fn dry_run(&self, io: &dyn MetadataIo, now: SystemTime, ctx: &CancelToken) -> Vec<Outcome> {
        self.run(io, now, ctx, true)
    }

    fn run(
        &self,
        io: &dyn MetadataIo,
        now: SystemTime,
        ctx: &CancelToken,
        dry_run: bool,
    ) -> Vec<Outcome> {
        if self.issues.is_empty() {
            return Vec::new();
        }
        let mut op = Operation::new(self, io, now, dry_run);
        let mut outcomes = Vec::with_capacity(self.issues.len());
        for (i, issue) in self.issues.iter().enumerate() {
            let outcome = if ctx.is_cancelled() {
                Outcome::new(self.index, issue.clone(), Change::None, Some(FhError::Cancelled))
            } else {
                issue.fix(&mut op)
            };
            outcomes.push(outcome.at_issue(i));
        }
        op.close();
        outcomes
    }
}

impl fmt::Display for ScannedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: \"{}\"", self.index, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pal::StdMetadataIo;
    use crate::policy::access::ScanAccessIssue;
    use crate::policy::name::{NameHandler, NameIssue};
    use crate::remediation::outcome::OutcomeStatus;
    use std::fs;

    fn name_issue(from: &str, to: &str) -> Issue {
        Issue::Name(NameIssue {
            original_name: from.to_string(),
            new_name: to.to_string(),
            handler: NameHandler::default(),
        })
    }

    #[test]
    fn display_is_index_and_path() {
        let file = ScannedFile::bare(Path::new("/r"), Path::new("a/b.txt"), 12);
        assert_eq!(file.to_string(), "[12]: \"a/b.txt\"");
        assert_eq!(file.name, "b.txt");
        assert!(file.description().is_empty());
    }

    #[test]
    fn description_lists_each_issue() {
        let mut file = ScannedFile::bare(Path::new("/r"), Path::new("note.txt "), 2);
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        file.issues.push(name_issue("note.txt ", "note.txt"));
        file.issues
            .push(Issue::ScanAccess(ScanAccessIssue::new("stat", &err)));
        assert_eq!(
            file.description(),
            "[2.0] file name: \"note.txt \": leading or trailing space: (fix: \"note.txt \" → \"note.txt\")\n\
             [2.1] access failure: \"note.txt \": stat: denied"
        );
    }

    #[test]
    fn healthy_file_fix_is_empty() {
        let file = ScannedFile::bare(Path::new("/nonexistent"), Path::new("x"), 0);
        let outcomes = file.fix(&StdMetadataIo, SystemTime::now(), &CancelToken::never());
        assert!(outcomes.is_empty());
    }

    #[test]
    fn cancelled_context_reports_every_issue_unattempted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a "), b"").unwrap();
        let meta = StdMetadataIo.stat(&dir.path().join("a ")).unwrap();
        let mut file = ScannedFile::bare(dir.path(), Path::new("a "), 0);
        file.record_metadata(&meta);
        file.issues.push(name_issue("a ", "a"));

        let ctx = CancelToken::new();
        ctx.cancel();
        let outcomes = file.fix(&StdMetadataIo, SystemTime::now(), &ctx);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status(), OutcomeStatus::Cancelled);
        assert_eq!(outcomes[0].tag(), "[0.0]");
        assert!(dir.path().join("a ").exists());
    }

    #[test]
    fn rename_fix_and_dry_run_report_same_change() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a "), b"x").unwrap();
        let meta = StdMetadataIo.stat(&dir.path().join("a ")).unwrap();
        let mut file = ScannedFile::bare(dir.path(), Path::new("a "), 0);
        file.record_metadata(&meta);
        file.issues.push(name_issue("a ", "a"));
        let ctx = CancelToken::never();

        let dry = file.dry_run(&StdMetadataIo, SystemTime::now(), &ctx);
        assert_eq!(dry.len(), 1);
        assert!(dry[0].error.as_ref().is_some_and(FhError::is_dry_run));
        assert!(dir.path().join("a ").exists());

        let real = file.fix(&StdMetadataIo, SystemTime::now(), &ctx);
        assert!(real[0].error.is_none(), "{}", real[0]);
        assert_eq!(real[0].change, dry[0].change);
        assert!(!dir.path().join("a ").exists());
        assert!(dir.path().join("a").exists());
    }

    /// Host I/O that cancels the pass as soon as a rename lands.
    struct CancelOnRename {
        ctx: CancelToken,
    }

    impl MetadataIo for CancelOnRename {
        fn stat(&self, path: &Path) -> crate::core::errors::Result<FileMetadata> {
            StdMetadataIo.stat(path)
        }

        fn set_attributes(
            &self,
            path: &Path,
            handle: Option<&std::fs::File>,
            attrs: crate::platform::pal::FileAttributes,
        ) -> crate::core::errors::Result<()> {
            StdMetadataIo.set_attributes(path, handle, attrs)
        }

        fn set_times(
            &self,
            path: &Path,
            handle: Option<&std::fs::File>,
            update: &crate::platform::pal::TimeUpdate,
        ) -> crate::core::errors::Result<()> {
            StdMetadataIo.set_times(path, handle, update)
        }

        fn rename(&self, from: &Path, to: &Path) -> crate::core::errors::Result<()> {
            let result = StdMetadataIo.rename(from, to);
            self.ctx.cancel();
            result
        }
    }

    #[test]
    fn cancellation_mid_pass_keeps_applied_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a "), b"x").unwrap();
        let meta = StdMetadataIo.stat(&dir.path().join("a ")).unwrap();
        let mut file = ScannedFile::bare(dir.path(), Path::new("a "), 4);
        file.record_metadata(&meta);
        file.issues.push(name_issue("a ", "a"));
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        file.issues
            .push(Issue::ScanAccess(ScanAccessIssue::new("read", &err)));

        let ctx = CancelToken::new();
        let io = CancelOnRename { ctx: ctx.clone() };
        let outcomes = file.fix(&io, SystemTime::now(), &ctx);

        assert!(dir.path().join("a").exists());
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status(), OutcomeStatus::Fixed);
        assert_eq!(outcomes[0].tag(), "[4.0]");
        assert!(matches!(outcomes[0].change, Change::Name { .. }));
        assert_eq!(outcomes[1].status(), OutcomeStatus::Cancelled);
        assert_eq!(outcomes[1].tag(), "[4.1]");
    }
}
