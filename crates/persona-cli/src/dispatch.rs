use color_eyre::Result;
use persona_core::{
    AutoRequest, CommandContext, CommandGroup, CommandInfo, ExecutionOutcome,
    GuardInstallRequest, LinkRequest, MigrateRequest, ProfileAddRequest, ProfileEditRequest,
    ProfileRemoveRequest, Prompt, ResolveRequest, SwitchRequest, TestRequest, UnlinkRequest,
};

use crate::cli::{scope, CommandGroupCli, GuardCommand};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
    prompt: &dyn Prompt,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    let info = command_info(group);
    match group {
        CommandGroupCli::Add(args) => {
            let request = ProfileAddRequest {
                username: args.username.clone(),
                name: args.name.clone(),
                email: args.email.clone(),
                ssh_key: args.ssh_key.clone(),
                host: args.host.clone(),
            };
            core_call(info, || persona_core::profile_add(ctx, &request))
        }
        CommandGroupCli::Edit(args) => {
            let request = ProfileEditRequest {
                username: args.username.clone(),
                name: args.name.clone(),
                email: args.email.clone(),
                ssh_key: args.ssh_key.clone(),
                host: args.host.clone(),
            };
            core_call(info, || persona_core::profile_edit(ctx, &request))
        }
        CommandGroupCli::Remove(args) => {
            let request = ProfileRemoveRequest {
                username: args.username.clone(),
                force: args.force,
            };
            core_call(info, || persona_core::profile_remove(ctx, &request))
        }
        CommandGroupCli::List => {
            core_call(info, || persona_core::profile_list(ctx))
        }
        CommandGroupCli::Switch(args) => {
            let request = SwitchRequest {
                username: args.username.clone(),
                scope: scope(args.local),
                capture: args.capture,
            };
            core_call(info, || persona_core::switch(ctx, &request))
        }
        CommandGroupCli::Link(args) => {
            let request = LinkRequest {
                username: args.username.clone(),
                path: args.path.clone(),
                mode: args.mode.into(),
                replace: args.replace,
            };
            core_call(info, || persona_core::link_add(ctx, &request))
        }
        CommandGroupCli::Unlink(args) => {
            let request = UnlinkRequest {
                path: args.path.clone(),
            };
            core_call(info, || persona_core::link_remove(ctx, &request))
        }
        CommandGroupCli::Links => {
            core_call(info, || persona_core::link_list(ctx))
        }
        CommandGroupCli::Resolve(args) => {
            let request = ResolveRequest {
                path: args.path.clone(),
            };
            core_call(info, || persona_core::resolve_path(ctx, &request))
        }
        CommandGroupCli::Auto(args) => {
            let request = AutoRequest {
                scope: scope(!args.global),
            };
            core_call(info, || persona_core::auto_switch(ctx, &request, prompt))
        }
        CommandGroupCli::Status => {
            core_call(info, || persona_core::status(ctx))
        }
        CommandGroupCli::Test(args) => {
            let request = TestRequest {
                username: args.username.clone(),
            };
            core_call(info, || persona_core::test_ssh(ctx, &request))
        }
        CommandGroupCli::Guard(cmd) => match cmd {
            GuardCommand::Check => {
                core_call(info, || persona_core::guard_check(ctx))
            }
            GuardCommand::Install(args) => {
                let request = GuardInstallRequest { force: args.force };
                core_call(info, || persona_core::guard_install(ctx, &request))
            }
            GuardCommand::Uninstall => {
                core_call(info, || persona_core::guard_uninstall(ctx))
            }
        },
        CommandGroupCli::Migrate(args) => {
            let request = MigrateRequest {
                drop_corrupt: args.drop_corrupt,
                adopt_project: args.adopt_project,
                dry_run: args.dry_run,
            };
            core_call(info, || persona_core::migrate(ctx, &request))
        }
    }
}

pub fn command_info(group: &CommandGroupCli) -> CommandInfo {
    let (group, name) = match group {
        CommandGroupCli::Add(_) => (CommandGroup::Add, "add"),
        CommandGroupCli::Edit(_) => (CommandGroup::Edit, "edit"),
        CommandGroupCli::Remove(_) => (CommandGroup::Remove, "remove"),
        CommandGroupCli::List => (CommandGroup::List, "list"),
        CommandGroupCli::Switch(_) => (CommandGroup::Switch, "switch"),
        CommandGroupCli::Link(_) => (CommandGroup::Link, "link"),
        CommandGroupCli::Unlink(_) => (CommandGroup::Unlink, "unlink"),
        CommandGroupCli::Links => (CommandGroup::Links, "links"),
        CommandGroupCli::Resolve(_) => (CommandGroup::Resolve, "resolve"),
        CommandGroupCli::Auto(_) => (CommandGroup::Auto, "auto"),
        CommandGroupCli::Status => (CommandGroup::Status, "status"),
        CommandGroupCli::Test(_) => (CommandGroup::Test, "test"),
        CommandGroupCli::Guard(GuardCommand::Check) => (CommandGroup::Guard, "check"),
        CommandGroupCli::Guard(GuardCommand::Install(_)) => (CommandGroup::Guard, "install"),
        CommandGroupCli::Guard(GuardCommand::Uninstall) => (CommandGroup::Guard, "uninstall"),
        CommandGroupCli::Migrate(_) => (CommandGroup::Migrate, "migrate"),
    };
    CommandInfo::new(group, name)
}

/// Failure outcome for an invocation that could not be set up.
pub fn setup_failure(err: &anyhow::Error) -> ExecutionOutcome {
    ExecutionOutcome::failure(
        format!("cannot start: {err}"),
        serde_json::json!({
            "reason": "setup_failed",
            "issues": err.chain().map(ToString::to_string).collect::<Vec<_>>(),
            "hint": "set PERSONA_HOME to a writable directory and re-run",
        }),
    )
}

/// Turns unexpected plumbing errors into a failure outcome so they still get an envelope.
fn core_call<F>(info: CommandInfo, action: F) -> Result<(CommandInfo, ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => Ok((info, outcome)),
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let issues: Vec<String> = err.chain().map(ToString::to_string).collect();
            Ok((
                info,
                ExecutionOutcome::failure(
                    err.to_string(),
                    serde_json::json!({
                        "reason": "internal_error",
                        "issues": issues,
                        "hint": "re-run with -vv for details",
                    }),
                ),
            ))
        }
    }
}
