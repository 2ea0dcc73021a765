use std::io::{self, BufRead, Write};
use std::path::Path;

use atty::Stream;
use persona_core::{Prompt, PromptAnswer};

/// Asks on the terminal; declines whenever nobody can answer.
pub struct TerminalPrompt {
    interactive: bool,
}

impl TerminalPrompt {
    pub fn new(json: bool) -> Self {
        Self {
            interactive: !json && atty::is(Stream::Stdin) && atty::is(Stream::Stderr),
        }
    }
}

impl Prompt for TerminalPrompt {
    fn confirm_switch(&self, username: &str, directory: &Path) -> PromptAnswer {
        if !self.interactive {
            tracing::debug!("no terminal to ask on; keeping the current identity");
            return PromptAnswer::No;
        }
        let mut stderr = io::stderr();
        let _ = write!(
            stderr,
            "{} is linked to {username}. Switch? [y]es/[n]o/[a]lways/ne[v]er: ",
            directory.display()
        );
        let _ = stderr.flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return PromptAnswer::No;
        }
        parse_answer(&line)
    }
}

fn parse_answer(line: &str) -> PromptAnswer {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => PromptAnswer::Yes,
        "a" | "always" => PromptAnswer::Always,
        "v" | "never" => PromptAnswer::Never,
        _ => PromptAnswer::No,
    }
}
