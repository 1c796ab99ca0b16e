#![forbid(unsafe_code)]

//! filehealth: finds files whose metadata violates health policies and fixes
//! them safely.
//!
//! Three policies ship with the crate:
//! 1. **Attributes**: unwanted attribute bits such as temporary
//! 2. **Names**: leading or trailing whitespace
//! 3. **Timestamps**: times outside configured bounds, with lenience
//!
//! A [`scanner::engine::Scanner`] walks a tree on a background thread and
//! streams [`scanner::file::ScannedFile`]s through a
//! [`scanner::iter::FileIter`]. Each file's issues can then be fixed (or dry
//! run) with change detection guarding against edits made since the scan.
//!
//! ```rust,no_run
//! use filehealth::prelude::*;
//!
//! let config = Config::load(None)?;
//! let scanner = Scanner::from_config(&config, std::time::SystemTime::now())?;
//! let ctx = CancelToken::never();
//! let (files, summary) = scanner.collect_files("/data", &ctx, 0)?;
//! for file in &files {
//!     for outcome in scanner.dry_run(file, &ctx) {
//!         println!("{} {outcome}", outcome.tag());
//!     }
//! }
//! println!("{summary}");
//! # Ok::<(), filehealth::core::errors::FhError>(())
//! ```

pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod logger;
pub mod platform;
pub mod policy;
pub mod remediation;
pub mod scanner;
