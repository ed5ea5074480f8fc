//! cli::commands::use_cmd
//!
//! `zed use [pool[@branch]]`: show or set the HEAD recorded in `.zed_head`.
//!
//! The branch is checked against the lake before it is recorded, so a
//! HEAD file never names a branch the lake did not know about when it was
//! written.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::charm::{Command, Spec};
use crate::cli::root::LakeParent;
use crate::core::commitish::Commitish;
use crate::core::head::{read_head, write_head};
use crate::core::CoreError;
use crate::lake::LakeError;
use crate::ui::output;

struct UseCommand {
    parent: LakeParent,
}

pub fn spec() -> Spec {
    Spec::new("use", |parent, _| {
        Ok(Arc::new(UseCommand {
            parent: LakeParent::from_parent(parent)?,
        }) as Arc<dyn Command>)
    })
    .usage("use [pool][@branch]")
    .short("show or set the working pool and branch")
    .long(
        "
The use command records the pool and branch that later commands act on
when -use is not given. The choice is written to .zed_head in the current
directory. With no argument, use prints the current choice.

The branch defaults to main.",
    )
}

#[async_trait]
impl Command for UseCommand {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        let config = self.parent.root().config();
        let arg = match args.as_slice() {
            [] => {
                let head = read_head(&config.work_dir)?.ok_or(CoreError::NoHead)?;
                output::print(format!("HEAD at {head}"));
                return Ok(());
            }
            [arg] => arg,
            _ => anyhow::bail!("use: too many arguments"),
        };
        let head = Commitish::parse(arg)?;

        let (_, lake) = self.parent.open()?;
        let (ctx, cleanup) = self.parent.root().init(Vec::new())?;
        let exists = lake.branch_exists(&ctx, &head).await;
        cleanup.run().await;
        if !exists? {
            return Err(LakeError::NotFound(format!("branch {head}")).into());
        }

        write_head(&config.work_dir, &head)?;
        tracing::debug!(head = %head, "recorded HEAD");
        output::print(format!("Switched to branch \"{}\" on pool \"{}\"", head.branch(), head.pool()));
        Ok(())
    }
}
