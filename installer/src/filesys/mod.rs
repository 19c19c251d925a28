//! Filesystem helpers

pub mod dir;
pub mod exists;
pub mod file;
