//! core
//!
//! Shared building blocks for zed commands.
//!
//! # Modules
//!
//! - [`paths`] - Configuration, data and HEAD file locations
//! - [`commitish`] - The `pool[@branch]` reference type
//! - [`head`] - Reading and writing `.zed_head`
//! - [`fs`] - Atomic file replacement
//! - [`config`] - The per-invocation configuration record

pub mod commitish;
pub mod config;
pub mod fs;
pub mod head;
pub mod paths;

use std::path::PathBuf;

use thiserror::Error;

pub use commitish::Commitish;

/// Errors from core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid reference '{input}': {reason}")]
    InvalidCommitish { input: String, reason: String },

    #[error("no HEAD: run 'zed use <pool>[@<branch>]' or pass -use")]
    NoHead,

    #[error("cannot determine data directory: set XDG_DATA_HOME, LOCALAPPDATA or HOME")]
    NoDataDir,

    #[error("cannot determine configuration directory: use -configdir")]
    NoConfigDir,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
