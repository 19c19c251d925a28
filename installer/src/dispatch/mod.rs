//! Install dispatch

pub mod dispatcher;
pub mod registry;
pub mod scripted;

pub use dispatcher::{Dispatcher, ItemReport, ItemStatus, PhaseResult};
pub use registry::{CustomInstaller, InstallerRegistry};
