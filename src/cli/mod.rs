//! Interactive pieces shared by the command-line front end.

pub mod prompt;
pub mod signals;
