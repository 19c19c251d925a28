//! Install manifest and catalog models

pub mod models;

pub use models::*;
