//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Result lines, warnings and error reporting
//! - [`prompts`] - Masked token prompts
//!
//! # Design
//!
//! Commands print through this module so results, warnings and errors land
//! on the right stream with consistent prefixes.

pub mod output;
pub mod prompts;
