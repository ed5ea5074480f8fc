//! ui::prompts
//!
//! Interactive prompts.
//!
//! # Design
//!
//! Prompts are only shown when standard input is a terminal. Otherwise a
//! command that needs input must get it from a flag and fails with
//! [`PromptError::NotInteractive`].

use std::io::{self, IsTerminal, Write};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no value entered")]
    Empty,

    #[error("not in interactive mode")]
    NotInteractive,

    #[error("read from terminal: {0}")]
    Io(#[from] io::Error),
}

/// True when standard input is a terminal.
pub fn interactive() -> bool {
    io::stdin().is_terminal()
}

/// Prompt on standard error for a secret without echoing it.
pub fn password(message: &str) -> Result<String, PromptError> {
    if !interactive() {
        return Err(PromptError::NotInteractive);
    }
    let mut stderr = io::stderr();
    write!(stderr, "{message}: ")?;
    stderr.flush()?;
    let value = rpassword::read_password()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(PromptError::Empty);
    }
    Ok(value)
}
