//! Application wiring and command execution

pub mod options;
pub mod run;
pub mod state;
