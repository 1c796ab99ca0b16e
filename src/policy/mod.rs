//! Health policies: the handlers that examine metadata and the issues they report.

pub mod access;
pub mod attributes;
pub mod issue;
pub mod name;
pub mod time;
