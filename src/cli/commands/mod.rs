//! cli::commands
//!
//! Command specs and bodies.
//!
//! # Architecture
//!
//! Each command module exposes a `spec()` that names the command, its help
//! text and a factory binding its flags. The body runs in [`Command::run`]:
//! 1. Validate positional arguments (return `NeedHelp` for a bare command)
//! 2. Start the signal-aware context with the command's initializers
//! 3. Call the lake and format the result
//!
//! [`Command::run`]: crate::charm::Command::run

pub mod auth;
pub mod create;
pub mod dev;
pub mod load;
pub mod ls;
pub mod query;
pub mod serve;
pub mod use_cmd;
