//! Content platform integration

pub mod resolver;
pub mod select;

pub use resolver::{ContentOutcome, ContentResolver};
pub use select::{FileKind, ResolvedAsset};
