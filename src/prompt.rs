use std::io::{self, IsTerminal};

use cliclack::confirm;

use crate::error::Result;

/// Asked before each destructive delete.
pub trait DeletionPrompt: Send + Sync {
    fn approve(&self, question: &str) -> Result<bool>;
}

/// Approves everything. Used when `--prompt-del` is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl DeletionPrompt for AutoApprove {
    fn approve(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Yes/no confirm in the terminal, defaulting to "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl DeletionPrompt for TerminalPrompt {
    fn approve(&self, question: &str) -> Result<bool> {
        let mut prompt = confirm(question).initial_value(false);
        Ok(prompt.interact()?)
    }
}

pub fn can_prompt_interactively() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}
