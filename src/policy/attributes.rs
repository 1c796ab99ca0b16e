//! Unwanted attribute bits.

#![allow(missing_docs)]

use crate::core::errors::{FhError, Result};
use crate::platform::pal::FileAttributes;
use crate::policy::issue::Examination;
use crate::remediation::operation::Operation;
use crate::remediation::outcome::Change;

/// Flags files carrying any of the `unwanted` attribute bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeHandler {
    pub unwanted: FileAttributes,
}

impl AttributeHandler {
    #[must_use]
    pub const fn new(unwanted: FileAttributes) -> Self {
        Self { unwanted }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        "File Attribute Issue Handler"
    }

    /// Platforms without native attribute data produce no issues.
    #[must_use]
    pub fn examine(&self, exam: &Examination<'_>) -> Option<AttributeIssue> {
        let original = exam.metadata.attributes?;
        let matched = original.intersection(self.unwanted);
        if matched.is_empty() {
            return None;
        }
        Some(AttributeIssue {
            original,
            matched,
            handler: *self,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeIssue {
    pub original: FileAttributes,
    /// Non-empty subset of both `original` and the handler's unwanted set.
    pub matched: FileAttributes,
    pub handler: AttributeHandler,
}

impl AttributeIssue {
    #[must_use]
    pub const fn summary(&self) -> &'static str {
        "file attributes"
    }

    #[must_use]
    pub fn description(&self) -> String {
        format!("unwanted attributes: {}", self.matched)
    }

    /// The mask a fix would write.
    #[must_use]
    pub const fn resolved(&self) -> FileAttributes {
        self.original.difference(self.matched)
    }

    #[must_use]
    pub fn resolution(&self) -> String {
        format!("{} → {}", self.original, self.resolved())
    }

    pub(crate) fn fix(&self, op: &mut Operation<'_>) -> (Change, Result<()>) {
        if let Err(err) = op.ensure_unchanged() {
            return (Change::None, Err(err));
        }

        // Re-read the live mask: other bits may have moved since the scan.
        let live = match op.live_metadata() {
            Ok(meta) => meta,
            Err(err) => return (Change::None, Err(err)),
        };
        let Some(current) = live.attributes else {
            return (
                Change::None,
                Err(FhError::unsupported(
                    op.current_path(),
                    "file attributes are not available",
                )),
            );
        };
        let updated = current.difference(self.matched);
        let change = Change::Attributes {
            before: current,
            after: updated,
        };

        if op.is_dry_run() {
            return (change, Err(FhError::DryRun));
        }
        let result = op.with_file(|file, path, io| io.set_attributes(path, Some(file), updated));
        (change, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pal::{FileMetadata, FileTimes};
    use proptest::prelude::*;
    use std::path::Path;
    use std::time::SystemTime;

    fn examine(handler: AttributeHandler, attrs: Option<FileAttributes>) -> Option<AttributeIssue> {
        let meta = FileMetadata {
            name: "f".to_string(),
            size: 0,
            mode: 0,
            is_dir: false,
            times: FileTimes::default(),
            attributes: attrs,
        };
        handler.examine(&Examination {
            root: Path::new("/"),
            path: Path::new("f"),
            index: 0,
            metadata: &meta,
            now: SystemTime::UNIX_EPOCH,
        })
    }

    #[test]
    fn no_issue_without_native_attributes() {
        assert!(examine(AttributeHandler::new(FileAttributes::TEMPORARY), None).is_none());
    }

    #[test]
    fn no_issue_when_nothing_unwanted_is_set() {
        let attrs = FileAttributes::ARCHIVE.union(FileAttributes::READONLY);
        assert!(examine(AttributeHandler::new(FileAttributes::TEMPORARY), Some(attrs)).is_none());
    }

    #[test]
    fn strings_describe_matched_bits_and_resolution() {
        let attrs = FileAttributes::ARCHIVE.union(FileAttributes::TEMPORARY);
        let issue = examine(AttributeHandler::new(FileAttributes::TEMPORARY), Some(attrs)).unwrap();
        assert_eq!(issue.summary(), "file attributes");
        assert_eq!(issue.description(), "unwanted attributes: T");
        assert_eq!(issue.resolution(), "A,T → A");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn resolution_mask_is_original_minus_matched(original in 0u32..0x8000, unwanted in 0u32..0x8000) {
            let original = FileAttributes::from_bits(original);
            let unwanted = FileAttributes::from_bits(unwanted);
            match examine(AttributeHandler::new(unwanted), Some(original)) {
                None => prop_assert!(original.intersection(unwanted).is_empty()),
                Some(issue) => {
                    prop_assert!(!issue.matched.is_empty());
                    prop_assert!(unwanted.contains(issue.matched));
                    prop_assert!(original.contains(issue.matched));
                    prop_assert_eq!(issue.resolved().bits(), original.bits() & !issue.matched.bits());
                    prop_assert!(issue.resolved().intersection(unwanted).is_empty());
                }
            }
        }
    }
}
