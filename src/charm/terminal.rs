//! Terminal width detection for help output.

use std::env;
use std::io;

use terminal_size::{terminal_size, terminal_size_of, Width};

pub const DEFAULT_WIDTH: usize = 80;

/// Width of the terminal attached to stderr, falling back to stdout,
/// `$COLUMNS`, and finally [`DEFAULT_WIDTH`].
pub fn width() -> usize {
    if let Some((Width(w), _)) = terminal_size_of(io::stderr()) {
        return usize::from(w);
    }
    if let Some((Width(w), _)) = terminal_size() {
        return usize::from(w);
    }
    columns_from_env(env::var("COLUMNS").ok().as_deref()).unwrap_or(DEFAULT_WIDTH)
}

fn columns_from_env(value: Option<&str>) -> Option<usize> {
    value?.trim().parse().ok().filter(|n: &usize| *n > 0)
}
