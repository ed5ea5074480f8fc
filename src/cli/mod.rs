//! cli
//!
//! The `zed` command tree.
//!
//! # Responsibilities
//!
//! - Build the spec tree and attach every command
//! - Hand the command line to [`crate::charm::exec`]
//! - Report the error that ends a command
//!
//! # Architecture
//!
//! [`build`] is the composition root. The root command owns the flags all
//! commands inherit and builds the [`Config`](crate::core::config::Config)
//! record; leaf commands reach it through their parent. `use`, `load` and
//! `query` are attached under both `zed` and `zed api`, and find their lake
//! through [`root::LakeParent`].

pub mod commands;
pub mod root;

use std::path::PathBuf;
use std::sync::Arc;

use crate::charm::{self, help_spec, Spec};
use crate::lake::Lake;
use crate::ui::output;

pub use root::{ApiCommand, LakeParent, RootCommand};

/// Collaborators that tests substitute for the real ones.
#[derive(Clone, Default)]
pub struct Environment {
    /// Lake used instead of opening `-lake`.
    pub lake: Option<Arc<dyn Lake>>,
    /// Directory holding `.zed_head`, instead of the current directory.
    pub work_dir: Option<PathBuf>,
}

/// The full `zed` command tree.
pub fn build() -> Arc<Spec> {
    build_with(Environment::default())
}

/// The `zed` command tree using `env`.
pub fn build_with(env: Environment) -> Arc<Spec> {
    let root = RootCommand::spec(env).build();
    root.add(help_spec());

    let auth = commands::auth::spec().build();
    auth.add(commands::auth::store_spec().build());
    auth.add(commands::auth::logout_spec().build());
    auth.add(commands::auth::ls_spec().build());
    root.add(auth);

    root.add(commands::create::spec().build());
    root.add(commands::ls::spec().build());

    let use_cmd = commands::use_cmd::spec().build();
    let load = commands::load::spec().build();
    let query = commands::query::spec().build();
    root.add(Arc::clone(&use_cmd));
    root.add(Arc::clone(&load));
    root.add(Arc::clone(&query));

    root.add(commands::serve::spec().build());

    let api = ApiCommand::spec().build();
    api.add(use_cmd);
    api.add(load);
    api.add(query);
    root.add(api);

    let dev = commands::dev::spec().build();
    dev.add(commands::dev::sleep_spec().build());
    root.add(dev);

    root
}

/// Run `args` (without the program name) against the full tree.
pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let root = build();
    charm::exec(&root, args).await
}

/// Print the error that ended a command.
pub fn report(err: &anyhow::Error) {
    output::error(err);
}
