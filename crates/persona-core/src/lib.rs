#![deny(clippy::all)]

mod core;

pub(crate) use crate::core::config;
pub(crate) use crate::core::config::context;
pub(crate) use crate::core::runtime::{effects, process};
pub(crate) use crate::core::tooling::outcome;
pub(crate) use crate::core::{fs, guard, identity, store};

#[cfg(test)]
pub(crate) use crate::core::testing;

pub use crate::core::config::context::{CommandContext, CommandInfo};
pub use crate::core::config::{Config, GlobalOptions, ToolOverrides};
pub use crate::core::runtime::effects::{ConfigScope, Effects, SharedEffects, SystemEffects};
pub use crate::core::runtime::process::RunOutput;
pub use crate::core::runtime::CommandGroup;
pub use crate::core::runtime::{format_status_message, to_json_response};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};

pub use crate::core::commands::{
    auto_switch, guard_check, guard_install, guard_uninstall, link_add, link_list, link_remove,
    migrate, profile_add, profile_edit, profile_list, profile_remove, resolve_path, status,
    switch, test_ssh, AutoRequest, GuardInstallRequest, LinkRequest, MigrateRequest,
    ProfileAddRequest, ProfileEditRequest, ProfileRemoveRequest, Prompt, PromptAnswer,
    ResolveRequest, SwitchRequest, TestRequest, UnlinkRequest, NO_SSH_KEY,
};
pub use persona_domain::LinkMode;
