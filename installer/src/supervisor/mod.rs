//! Supervised process lifecycle

pub mod boot;
pub mod fsm;
pub mod process;
pub mod scanner;

pub use boot::{AppBooter, AppSupervisor, WorkingDirGuard};
pub use fsm::{RunOutcome, RunState};
pub use process::{supervise, RunReport, SupervisedChild};
