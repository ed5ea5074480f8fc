//! ui::output
//!
//! User-facing messages.
//!
//! # Design
//!
//! Results go to standard output. Warnings and errors go to standard
//! error, errors prefixed with the program name. Usage errors already
//! start with the command path and are printed unchanged.

use std::fmt::Display;
use std::io::{self, Write};

use crate::charm::CharmError;

/// Name errors are prefixed with.
pub const PROGRAM: &str = "zed";

/// Print a result line.
pub fn print(message: impl Display) {
    println!("{message}");
}

/// Print a status note to standard error.
pub fn note(message: impl Display) {
    eprintln!("{message}");
}

/// Print a warning to standard error.
pub fn warn(message: impl Display) {
    eprintln!("warning: {message}");
}

/// Write a warning to `out`, usually a display bypass writer.
pub fn warn_to(out: &mut dyn Write, message: impl Display) -> io::Result<()> {
    writeln!(out, "warning: {message}")
}

/// Print an error (always shown).
pub fn error(err: &anyhow::Error) {
    eprintln!("{}", format_error(err));
}

/// The message printed for an error that ends a command.
pub fn format_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<CharmError>() {
        Some(usage) if usage.is_usage() => usage.to_string(),
        _ => format!("{PROGRAM}: {err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn usage_errors_keep_their_path() {
        let err = anyhow::Error::new(CharmError::NoSuchSubcommand {
            path: "zed".into(),
            name: "bogus".into(),
            available: vec!["load".into()],
        });
        assert!(format_error(&err).starts_with("zed: no such sub-command \"bogus\""));
    }

    #[test]
    fn other_errors_get_program_prefix_and_context() {
        let err = Err::<(), _>(io::Error::other("disk full"))
            .context("write HEAD")
            .unwrap_err();
        assert_eq!(format_error(&err), "zed: write HEAD: disk full");
    }

    #[test]
    fn warnings_go_to_writer() {
        let mut out = Vec::new();
        warn_to(&mut out, "skipped a.json").unwrap();
        assert_eq!(out, b"warning: skipped a.json\n");
    }
}
