//! charm
//!
//! A small framework for hierarchical command-line programs in the style of
//! `zed load -use pool@main file.zng`.
//!
//! Commands are declared as a tree of [`Spec`]s. At run time the dispatcher
//! walks the tree for the given arguments, constructing one [`Command`] value
//! per level. Every level parses its own single-dash flags plus the flags of
//! all its ancestors, and the deepest command runs with whatever positional
//! arguments remain.
//!
//! Commands return [`CharmError::NeedHelp`] to have their help printed and
//! [`CharmError::NoRun`] when they only group sub-commands.

mod dispatch;
mod flags;
mod help;
mod spec;
pub mod terminal;

pub use dispatch::{
    exec, exec_sub, exec_to, is_need_help, path_name, search, search_help, CharmError, Instance,
};
pub use flags::{
    format_duration, parse_duration, ByteSize, Flag, FlagDef, FlagError, FlagSet, FlagType,
    ParseMode, Value,
};
pub use help::{format_paragraph, help_spec, render};
pub use spec::{downcast, AsAny, Command, Factory, Spec};
