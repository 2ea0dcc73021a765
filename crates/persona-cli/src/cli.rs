use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use persona_core::{ConfigScope, LinkMode};
use serde::{Deserialize, Serialize};

pub const PERSONA_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const PERSONA_BEFORE_HELP: &str = concat!(
    "persona ",
    env!("CARGO_PKG_VERSION"),
    " – Per-directory git identities\n\n",
    "\x1b[1;36mProfiles\x1b[0m\n",
    "  add / edit       Store or change a named identity (name, email, SSH key, host).\n",
    "  remove           Delete a profile (--force also drops its directory links).\n",
    "  list             Show stored profiles and which one git is using.\n",
    "  switch           Write a profile into git config (--local for this repository).\n",
    "  test             Check that a profile's SSH key logs in as that account.\n\n",
    "\x1b[1;36mDirectories\x1b[0m\n",
    "  link / unlink    Assign a profile to a directory tree, or drop the assignment.\n",
    "  links            List directory links and legacy project entries.\n",
    "  resolve          Show which profile a directory resolves to.\n",
    "  auto             Apply the directory's profile; call it from your shell prompt.\n\n",
    "\x1b[1;36mSafety\x1b[0m\n",
    "  status           Compare the directory's profile with git and the GitHub CLI.\n",
    "  guard            Install or run the pre-commit identity check.\n",
    "  migrate          Rewrite older profile records in the current format.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "persona",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = PERSONA_BEFORE_HELP,
    help_template = PERSONA_HELP_TEMPLATE
)]
pub struct PersonaCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print)",
        global = true
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)", global = true)]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Store a new profile.")]
    Add(AddArgs),
    #[command(about = "Change fields of a stored profile.")]
    Edit(EditArgs),
    #[command(about = "Delete a stored profile.")]
    Remove(RemoveArgs),
    #[command(about = "List stored profiles.")]
    List,
    #[command(about = "Write a profile into git configuration.")]
    Switch(SwitchArgs),
    #[command(about = "Assign a profile to a directory and everything below it.")]
    Link(LinkArgs),
    #[command(about = "Remove the link for a directory.")]
    Unlink(PathArgs),
    #[command(about = "List directory links.")]
    Links,
    #[command(about = "Show which profile a directory resolves to.")]
    Resolve(PathArgs),
    #[command(about = "Apply the current directory's profile according to its link mode.")]
    Auto(AutoArgs),
    #[command(about = "Summarize the identity in effect here.")]
    Status,
    #[command(about = "Authenticate over SSH with a profile's key.")]
    Test(UserArgs),
    #[command(subcommand, about = "Pre-commit identity guard.")]
    Guard(GuardCommand),
    #[command(about = "Rewrite older profile records in the current format.")]
    Migrate(MigrateArgs),
}

#[derive(Subcommand, Debug)]
pub enum GuardCommand {
    #[command(about = "Check the directory's profile against the GitHub CLI login.")]
    Check,
    #[command(about = "Install the pre-commit hook in this repository.")]
    Install(GuardInstallArgs),
    #[command(about = "Remove persona's pre-commit hook from this repository.")]
    Uninstall,
}

#[derive(Args, Debug)]
pub struct UserArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
    #[arg(long, help = "Display name written to user.name")]
    pub name: String,
    #[arg(long, help = "Address written to user.email")]
    pub email: String,
    #[arg(long, value_name = "PATH", help = "Private key used for this account")]
    pub ssh_key: Option<String>,
    #[arg(long, help = "Git host (defaults to github.com)")]
    pub host: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long, value_name = "PATH", help = "New key path, or `none` to clear it")]
    pub ssh_key: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
    #[arg(long, help = "Also remove directory links pointing at the profile")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct SwitchArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
    #[arg(long, help = "Write to this repository's config instead of the global one")]
    pub local: bool,
    #[arg(long, help = "Store the identity git currently uses into the profile first")]
    pub capture: bool,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
    #[arg(value_name = "PATH", help = "Directory to link (defaults to the current one)")]
    pub path: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ModeArg::Always)]
    pub mode: ModeArg,
    #[arg(long, help = "Replace an existing link for the same directory")]
    pub replace: bool,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    #[arg(value_name = "PATH", help = "Directory (defaults to the current one)")]
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AutoArgs {
    #[arg(long, help = "Switch the global identity instead of the repository's")]
    pub global: bool,
}

#[derive(Args, Debug)]
pub struct GuardInstallArgs {
    #[arg(long, help = "Move an existing pre-commit hook aside instead of refusing")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[arg(long, help = "Delete lines that cannot be read")]
    pub drop_corrupt: bool,
    #[arg(long, help = "Convert the legacy project entry for this directory into a link")]
    pub adopt_project: bool,
    #[arg(long, help = "Report what would change without writing")]
    pub dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModeArg {
    Always,
    Ask,
    Never,
}

impl From<ModeArg> for LinkMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Always => LinkMode::Always,
            ModeArg::Ask => LinkMode::Ask,
            ModeArg::Never => LinkMode::Never,
        }
    }
}

pub fn scope(local: bool) -> ConfigScope {
    if local {
        ConfigScope::Local
    } else {
        ConfigScope::Global
    }
}
