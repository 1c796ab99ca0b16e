//! Platform abstraction for reading and writing file metadata.

pub mod pal;
