//! Metadata I/O abstraction and the host implementation backed by std + filetime.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::core::errors::{FhError, Result};

// ──────────────────── attributes ────────────────────

/// File attribute bitmask using the Win32 `FILE_ATTRIBUTE_*` bit values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileAttributes(u32);

/// (bit, code, name) for every attribute the crate knows how to name.
const ATTRIBUTE_TABLE: [(u32, &str, &str); 13] = [
    (0x0001, "R", "readonly"),
    (0x0002, "H", "hidden"),
    (0x0004, "S", "system"),
    (0x0010, "D", "directory"),
    (0x0020, "A", "archive"),
    (0x0080, "N", "normal"),
    (0x0100, "T", "temporary"),
    (0x0200, "P", "sparse"),
    (0x0400, "L", "reparse"),
    (0x0800, "C", "compressed"),
    (0x1000, "O", "offline"),
    (0x2000, "I", "not_content_indexed"),
    (0x4000, "E", "encrypted"),
];

impl FileAttributes {
    pub const READONLY: Self = Self(0x0001);
    pub const HIDDEN: Self = Self(0x0002);
    pub const SYSTEM: Self = Self(0x0004);
    pub const DIRECTORY: Self = Self(0x0010);
    pub const ARCHIVE: Self = Self(0x0020);
    pub const NORMAL: Self = Self(0x0080);
    pub const TEMPORARY: Self = Self(0x0100);
    pub const SPARSE: Self = Self(0x0200);
    pub const REPARSE: Self = Self(0x0400);
    pub const COMPRESSED: Self = Self(0x0800);
    pub const OFFLINE: Self = Self(0x1000);
    pub const NOT_CONTENT_INDEXED: Self = Self(0x2000);
    pub const ENCRYPTED: Self = Self(0x4000);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bits of `self` that are not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// One-letter codes of the named bits that are set, in bit order.
    #[must_use]
    pub fn codes(self) -> Vec<&'static str> {
        ATTRIBUTE_TABLE
            .iter()
            .filter(|(bit, _, _)| self.0 & bit != 0)
            .map(|(_, code, _)| *code)
            .collect()
    }

    fn unnamed_bits(self) -> u32 {
        let named = ATTRIBUTE_TABLE.iter().fold(0u32, |acc, (bit, _, _)| acc | bit);
        self.0 & !named
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.codes().into_iter().map(str::to_string).collect();
        let rest = self.unnamed_bits();
        if rest != 0 {
            parts.push(format!("0x{rest:x}"));
        }
        f.write_str(&parts.join(","))
    }
}

impl FromStr for FileAttributes {
    type Err = FhError;

    /// Parses a `,`- or `|`-separated list of codes (`T`) or names (`temporary`).
    fn from_str(raw: &str) -> Result<Self> {
        let mut value = Self::empty();
        for token in raw.split([',', '|']).map(str::trim).filter(|t| !t.is_empty()) {
            let bit = ATTRIBUTE_TABLE
                .iter()
                .find(|(_, code, name)| {
                    token.eq_ignore_ascii_case(code) || token.eq_ignore_ascii_case(name)
                })
                .map(|(bit, _, _)| *bit)
                .ok_or_else(|| FhError::InvalidConfig {
                    details: format!("unknown file attribute {token:?}"),
                })?;
            value = value.union(Self(bit));
        }
        Ok(value)
    }
}

// ──────────────────── metadata snapshot ────────────────────

/// Platform timestamps. `None` means the platform does not expose that field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub changed: Option<SystemTime>,
}

/// Metadata snapshot used for examination and change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    /// Full mode including type bits on Unix; synthesized elsewhere.
    pub mode: u32,
    pub is_dir: bool,
    pub times: FileTimes,
    /// `None` on platforms without a native attribute store.
    pub attributes: Option<FileAttributes>,
}

impl FileMetadata {
    /// Build a snapshot from std metadata for the entry at `path`.
    #[must_use]
    pub fn from_std(path: &Path, meta: &fs::Metadata) -> Self {
        let name = path.file_name().map_or_else(
            || path.to_string_lossy().into_owned(),
            |n| n.to_string_lossy().into_owned(),
        );
        Self {
            name,
            size: meta.len(),
            mode: native_mode(meta),
            is_dir: meta.is_dir(),
            times: native_times(meta),
            attributes: native_attributes(meta),
        }
    }

    /// Last-write time, or the epoch when the platform omits it.
    #[must_use]
    pub fn modified(&self) -> SystemTime {
        self.times.modified.unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

/// Timestamp write request. Only `Some` fields are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeUpdate {
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub changed: Option<SystemTime>,
}

impl TimeUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.created.is_none()
            && self.accessed.is_none()
            && self.modified.is_none()
            && self.changed.is_none()
    }
}

/// Open permission a fix needs. Ordered so `max` gives the union.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

// ──────────────────── capability ────────────────────

/// Raw metadata read/write capability used by the scanner and by fixes.
pub trait MetadataIo: Send + Sync {
    /// Stat `path` without following symlinks.
    fn stat(&self, path: &Path) -> Result<FileMetadata>;

    /// Write back the full attribute mask.
    fn set_attributes(&self, path: &Path, handle: Option<&File>, attrs: FileAttributes)
    -> Result<()>;

    /// Write only the requested timestamps.
    fn set_times(&self, path: &Path, handle: Option<&File>, update: &TimeUpdate) -> Result<()>;

    fn open(&self, path: &Path, mode: AccessMode, is_dir: bool) -> Result<File> {
        open_std(path, mode, is_dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|source| FhError::io(from, source))
    }

    /// Whether anything (file, directory, dangling link) occupies `path`.
    fn exists(&self, path: &Path) -> Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(FhError::io(path, err)),
        }
    }
}

/// Host implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdMetadataIo;

impl StdMetadataIo {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MetadataIo for StdMetadataIo {
    fn stat(&self, path: &Path) -> Result<FileMetadata> {
        let meta = fs::symlink_metadata(path).map_err(|source| FhError::io(path, source))?;
        Ok(FileMetadata::from_std(path, &meta))
    }

    fn set_attributes(
        &self,
        path: &Path,
        handle: Option<&File>,
        attrs: FileAttributes,
    ) -> Result<()> {
        write_native_attributes(path, handle, attrs)
    }

    fn set_times(&self, path: &Path, handle: Option<&File>, update: &TimeUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        if update.changed.is_some() {
            return Err(FhError::unsupported(path, "change time cannot be written"));
        }
        if let Some(file) = handle {
            let mut times = fs::FileTimes::new();
            if let Some(at) = update.accessed {
                times = times.set_accessed(at);
            }
            if let Some(mt) = update.modified {
                times = times.set_modified(mt);
            }
            if let Some(ct) = update.created {
                times = with_created(path, times, ct)?;
            }
            return file
                .set_times(times)
                .map_err(|source| FhError::io(path, source));
        }
        if update.created.is_some() {
            return Err(FhError::unsupported(
                path,
                "creation time can only be written through an open handle",
            ));
        }
        if let Some(at) = update.accessed {
            filetime::set_file_atime(path, filetime::FileTime::from_system_time(at))
                .map_err(|source| FhError::io(path, source))?;
        }
        if let Some(mt) = update.modified {
            filetime::set_file_mtime(path, filetime::FileTime::from_system_time(mt))
                .map_err(|source| FhError::io(path, source))?;
        }
        Ok(())
    }
}

fn open_std(path: &Path, mode: AccessMode, is_dir: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);
    // Directories cannot be opened for writing.
    if mode == AccessMode::ReadWrite && !is_dir {
        options.write(true);
    }
    if is_dir {
        allow_directory_handle(&mut options);
    }
    options.open(path).map_err(|source| FhError::io(path, source))
}

// ──────────────────── platform specifics ────────────────────

#[cfg(windows)]
fn allow_directory_handle(options: &mut OpenOptions) {
    use std::os::windows::fs::OpenOptionsExt;
    // FILE_FLAG_BACKUP_SEMANTICS
    options.custom_flags(0x0200_0000);
}

#[cfg(not(windows))]
fn allow_directory_handle(_options: &mut OpenOptions) {}

#[cfg(unix)]
fn native_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(not(unix))]
fn native_mode(meta: &fs::Metadata) -> u32 {
    let base = if meta.permissions().readonly() { 0o444 } else { 0o666 };
    if meta.is_dir() { base | 0o040_000 } else { base }
}

fn native_times(meta: &fs::Metadata) -> FileTimes {
    FileTimes {
        // Creation time is only reported where it can also be written back.
        created: if cfg!(windows) { meta.created().ok() } else { None },
        accessed: meta.accessed().ok(),
        modified: meta.modified().ok(),
        changed: None,
    }
}

#[cfg(windows)]
fn native_attributes(meta: &fs::Metadata) -> Option<FileAttributes> {
    use std::os::windows::fs::MetadataExt;
    Some(FileAttributes::from_bits(meta.file_attributes()))
}

#[cfg(not(windows))]
fn native_attributes(_meta: &fs::Metadata) -> Option<FileAttributes> {
    None
}

#[cfg(windows)]
fn write_native_attributes(path: &Path, handle: Option<&File>, attrs: FileAttributes) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|source| FhError::io(path, source))?;
    let current = native_attributes(&meta).unwrap_or_default();
    let delta = FileAttributes::from_bits(current.bits() ^ attrs.bits());
    if !delta.difference(FileAttributes::READONLY).is_empty() {
        return Err(FhError::unsupported(
            path,
            format!("only the read-only attribute can be written (requested change: {delta})"),
        ));
    }
    let mut perms = meta.permissions();
    perms.set_readonly(attrs.contains(FileAttributes::READONLY));
    match handle {
        Some(file) => file.set_permissions(perms),
        None => fs::set_permissions(path, perms),
    }
    .map_err(|source| FhError::io(path, source))
}

#[cfg(not(windows))]
fn write_native_attributes(
    path: &Path,
    _handle: Option<&File>,
    _attrs: FileAttributes,
) -> Result<()> {
    Err(FhError::unsupported(
        path,
        "file attributes are not available on this platform",
    ))
}

#[cfg(windows)]
fn with_created(_path: &Path, times: fs::FileTimes, created: SystemTime) -> Result<fs::FileTimes> {
    use std::os::windows::fs::FileTimesExt;
    Ok(times.set_created(created))
}

#[cfg(not(windows))]
fn with_created(path: &Path, _times: fs::FileTimes, _created: SystemTime) -> Result<fs::FileTimes> {
    Err(FhError::unsupported(
        path,
        "creation time cannot be written on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn attribute_display_joins_codes_in_bit_order() {
        let attrs = FileAttributes::TEMPORARY.union(FileAttributes::ARCHIVE);
        assert_eq!(attrs.to_string(), "A,T");
        assert_eq!(FileAttributes::empty().to_string(), "");
    }

    #[test]
    fn attribute_display_keeps_unnamed_bits() {
        let attrs = FileAttributes::from_bits(0x0001 | 0x0001_0000);
        assert_eq!(attrs.to_string(), "R,0x10000");
    }

    #[test]
    fn attribute_parse_accepts_codes_and_names() {
        let parsed: FileAttributes = "t, Hidden|r".parse().unwrap();
        assert_eq!(
            parsed,
            FileAttributes::TEMPORARY
                .union(FileAttributes::HIDDEN)
                .union(FileAttributes::READONLY)
        );
        assert_eq!("".parse::<FileAttributes>().unwrap(), FileAttributes::empty());
    }

    #[test]
    fn attribute_parse_rejects_unknown_token() {
        let err = "T,bogus".parse::<FileAttributes>().unwrap_err();
        assert_eq!(err.code(), "FH-1001");
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn attribute_algebra() {
        let a = FileAttributes::ARCHIVE.union(FileAttributes::TEMPORARY);
        assert!(a.contains(FileAttributes::TEMPORARY));
        assert_eq!(a.difference(FileAttributes::TEMPORARY), FileAttributes::ARCHIVE);
        assert_eq!(
            a.intersection(FileAttributes::TEMPORARY.union(FileAttributes::HIDDEN)),
            FileAttributes::TEMPORARY
        );
    }

    #[test]
    fn access_mode_max_is_union() {
        assert_eq!(
            AccessMode::ReadOnly.max(AccessMode::ReadWrite),
            AccessMode::ReadWrite
        );
        assert_eq!(AccessMode::default(), AccessMode::ReadOnly);
    }

    #[test]
    fn std_stat_reports_name_size_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"hello").unwrap();

        let meta = StdMetadataIo.stat(&path).unwrap();
        assert_eq!(meta.name, "data.bin");
        assert_eq!(meta.size, 5);
        assert!(!meta.is_dir);
        assert!(meta.times.modified.is_some());

        let dir_meta = StdMetadataIo.stat(dir.path()).unwrap();
        assert!(dir_meta.is_dir);
    }

    #[test]
    fn std_stat_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StdMetadataIo.stat(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.code(), "FH-3002");
    }

    #[test]
    fn std_set_times_by_path_and_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        fs::write(&path, b"x").unwrap();
        let target = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);

        StdMetadataIo
            .set_times(
                &path,
                None,
                &TimeUpdate {
                    modified: Some(target),
                    ..TimeUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(StdMetadataIo.stat(&path).unwrap().times.modified, Some(target));

        let later = target + Duration::from_secs(60);
        let file = StdMetadataIo.open(&path, AccessMode::ReadWrite, false).unwrap();
        StdMetadataIo
            .set_times(
                &path,
                Some(&file),
                &TimeUpdate {
                    modified: Some(later),
                    ..TimeUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(StdMetadataIo.stat(&path).unwrap().times.modified, Some(later));
    }

    #[test]
    fn std_change_time_write_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.txt");
        fs::write(&path, b"x").unwrap();
        let err = StdMetadataIo
            .set_times(
                &path,
                None,
                &TimeUpdate {
                    changed: Some(SystemTime::now()),
                    ..TimeUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, FhError::Unsupported { .. }));
    }

    #[cfg(not(windows))]
    #[test]
    fn attributes_are_unsupported_without_native_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"x").unwrap();
        assert!(StdMetadataIo.stat(&path).unwrap().attributes.is_none());
        let err = StdMetadataIo
            .set_attributes(&path, None, FileAttributes::empty())
            .unwrap_err();
        assert!(matches!(err, FhError::Unsupported { .. }));
    }

    #[test]
    fn exists_distinguishes_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e.txt");
        assert!(!StdMetadataIo.exists(&path).unwrap());
        fs::write(&path, b"x").unwrap();
        assert!(StdMetadataIo.exists(&path).unwrap());
    }
}
