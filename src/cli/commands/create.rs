//! cli::commands::create
//!
//! `zed create <pool>`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::charm::{CharmError, Command, Spec};
use crate::cli::root::{root_of, RootCommand};
use crate::ui::output;

struct CreateCommand {
    root: Arc<RootCommand>,
}

pub fn spec() -> Spec {
    Spec::new("create", |parent, _| {
        Ok(Arc::new(CreateCommand {
            root: root_of(parent)?,
        }) as Arc<dyn Command>)
    })
    .usage("create <pool>")
    .short("create a new pool")
    .long(
        "
The create command creates a pool with the given name. The pool starts
with one empty branch, main.",
    )
}

#[async_trait]
impl Command for CreateCommand {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        let name = match args.as_slice() {
            [] => return Err(CharmError::NeedHelp.into()),
            [name] => name.clone(),
            _ => anyhow::bail!("create: too many arguments"),
        };
        let config = self.root.config();
        let lake = self.root.open_lake(&config.lake, &config)?;
        let (ctx, cleanup) = self.root.init(Vec::new())?;
        let result = lake.create_pool(&ctx, &name).await;
        cleanup.run().await;
        let info = result?;
        output::print(format!("pool created: {} {}", info.name, info.id));
        Ok(())
    }
}
