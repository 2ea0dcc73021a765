//! Internal implementation modules for `persona-core`.
//!
//! Callers outside the crate should use the handlers re-exported from the
//! crate root rather than reaching into these modules.

pub mod commands;
pub mod config;
pub mod fs;
pub mod guard;
pub mod identity;
pub mod runtime;
pub mod store;
pub mod tooling;

#[cfg(test)]
pub(crate) mod testing;
