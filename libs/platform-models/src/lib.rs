//! Content platform API models

pub mod models;

pub use models::*;
