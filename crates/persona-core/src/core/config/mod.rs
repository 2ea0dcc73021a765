pub mod context;
mod settings;

pub use settings::{Config, GlobalOptions, ToolOverrides};
pub(crate) use settings::{EnvSnapshot, GUARD_SKIP_ENV, HOME_ENV};
