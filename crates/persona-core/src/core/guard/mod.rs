//! Commit-time identity checks and the git hook that runs them.

pub mod hook;
mod validator;

pub use hook::{HookError, HookInstall, HookRemoval, InstallAction};
pub use validator::{GuardReport, GuardState, GuardValidator};
