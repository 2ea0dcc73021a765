use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use persona_core::{CommandContext, Config, GlobalOptions, SharedEffects, SystemEffects};

mod cli;
mod dispatch;
mod output;
mod prompt;
mod style;

use cli::PersonaCli;
use output::{emit_output, OutputOptions};
use prompt::TerminalPrompt;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PersonaCli::parse();
    init_tracing(cli.trace, cli.quiet, cli.verbose);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
    };

    let opts = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };
    let prompt = TerminalPrompt::new(cli.json);
    let setup = Config::from_env().and_then(|config| {
        let effects: SharedEffects = Arc::new(SystemEffects::with_tools(config.tools()));
        CommandContext::new(&global, effects, config)
    });
    let (info, outcome) = match setup {
        Ok(ctx) => dispatch::dispatch_command(&ctx, &cli.command, &prompt)?,
        Err(err) => {
            tracing::debug!(error = ?err, "setup failed");
            (
                dispatch::command_info(&cli.command),
                dispatch::setup_failure(&err),
            )
        }
    };
    let code = emit_output(&opts, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, quiet: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("persona_cli={level},persona_core={level},persona_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
