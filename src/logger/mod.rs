//! Activity logging: JSONL append-only file fed by a dedicated thread.

pub mod activity;
pub mod jsonl;
