//! Scanner: background walk, name filter, streamed results, fix entry points.

pub mod engine;
pub mod file;
pub mod iter;
pub mod job;
pub mod patterns;
pub mod stats;
