//! cli::commands::query
//!
//! `zed query`: run a query and write its results.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;

use crate::charm::{CharmError, Command, Flag, Spec};
use crate::cli::root::LakeParent;
use crate::core::head::resolve_head;
use crate::signalctx::Initializer;
use crate::zio::{self, OutputFlags};

struct QueryCommand {
    parent: LakeParent,
    use_flag: Flag<String>,
    includes: Flag<Vec<String>>,
    output: OutputFlags,
}

pub fn spec() -> Spec {
    Spec::new("query", |parent, flags| {
        Ok(Arc::new(QueryCommand {
            parent: LakeParent::from_parent(parent)?,
            use_flag: flags.string("use", "", "query pool[@branch] instead of HEAD"),
            includes: flags.strings("I", "source file containing query text (may be repeated)"),
            output: OutputFlags::bind(flags),
        }) as Arc<dyn Command>)
    })
    .usage("query [options] [query]")
    .short("run a query against the lake")
    .long(
        "
The query command runs a query and writes the results to standard output
or to the file named by -o.

A query that does not name its source reads from the branch given by -use
or the HEAD recorded by 'zed use'. Query text may also be read from files
with -I; their contents come before the query argument.",
    )
}

impl QueryCommand {
    async fn query_text(&self, args: &[String]) -> Result<String> {
        let mut parts = Vec::new();
        for path in self.includes.get() {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("read include file {path}"))?;
            parts.push(text);
        }
        parts.extend(args.iter().cloned());
        Ok(parts.join("\n"))
    }
}

#[async_trait]
impl Command for QueryCommand {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        if args.is_empty() && self.includes.get().is_empty() {
            return Err(CharmError::NeedHelp.into());
        }
        let text = self.query_text(&args).await?;
        let (config, lake) = self.parent.open()?;
        let head = resolve_head(&self.use_flag.get(), &config.work_dir)?;

        let initializers: Vec<Box<dyn Initializer>> = vec![Box::new(self.output.clone())];
        let (ctx, cleanup) = self.parent.root().init(initializers)?;
        let result = async {
            let mut stream = lake.query(&ctx, head.as_ref(), &text).await?;
            let mut out = self.output.open().await?;
            let written = zio::copy(&ctx, stream.as_mut(), &mut out, self.output.format()).await?;
            Ok::<_, anyhow::Error>(written)
        }
        .await;
        cleanup.run().await;

        let written = result?;
        tracing::debug!(bytes = written, "query complete");
        Ok(())
    }
}
