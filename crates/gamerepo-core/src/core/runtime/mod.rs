//! Installer execution and periodic task scheduling.

pub mod driver;
pub mod install;
pub(crate) mod process;
pub mod schedule;

pub use driver::run_periodic;
pub use install::{InstallError, InstallOutcome};
pub use process::RunOutput;
pub use schedule::{TaskGuard, TaskTicket};
