//! zedcli - command-line front end for Zed data lakes
//!
//! The `zed` binary composes many sub-commands into one executable. This
//! crate holds the command framework and the pieces commands share.
//!
//! # Architecture
//!
//! - [`charm`] - Command registry, flag parsing, dispatch and help
//! - [`signalctx`] - Signal-aware cancellation context and cleanup chain
//! - [`cli`] - The `zed` command tree and command bodies
//! - [`lake`] - The lake handle commands talk to (remote, in-memory, HTTP routes)
//! - [`httpd`] - HTTP server scaffold with graceful shutdown
//! - [`auth`] - Credential store for lake services
//! - [`display`] - Terminal status line for long-running work
//! - [`zio`] - Reading inputs and writing query output
//! - [`core`] - Paths, HEAD file, references and configuration
//! - [`logging`] - Tracing subscriber setup
//! - [`ui`] - User-facing messages and prompts
//!
//! # Flow
//!
//! `main` hands the arguments to [`charm::exec`] on the tree built by
//! [`cli::build`]. Dispatch instantiates each command on the path, parses
//! its flags and runs the leaf. A leaf asks [`signalctx::init`] for a
//! context that SIGINT and SIGTERM cancel, does its work against a
//! [`lake::Lake`], and runs the returned cleanup before exiting.

pub mod auth;
pub mod charm;
pub mod cli;
pub mod core;
pub mod display;
pub mod httpd;
pub mod lake;
pub mod logging;
pub mod signalctx;
pub mod ui;
pub mod zio;
