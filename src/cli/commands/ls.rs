//! cli::commands::ls
//!
//! `zed ls`: list pools and their branches.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::charm::{Command, Flag, Spec};
use crate::cli::root::{root_of, RootCommand};
use crate::lake::PoolInfo;
use crate::ui::output;

struct LsCommand {
    root: Arc<RootCommand>,
    long: Flag<bool>,
}

pub fn spec() -> Spec {
    Spec::new("ls", |parent, flags| {
        Ok(Arc::new(LsCommand {
            root: root_of(parent)?,
            long: flags.bool("l", false, "show pool ids, creation times and branches"),
        }) as Arc<dyn Command>)
    })
    .usage("ls [-l]")
    .short("list pools in the lake")
}

fn format_pool(pool: &PoolInfo, long: bool) -> String {
    if !long {
        return pool.name.clone();
    }
    format!(
        "{} {} {} [{}]",
        pool.name,
        pool.id,
        pool.created.format("%Y-%m-%dT%H:%M:%SZ"),
        pool.branches.join(", ")
    )
}

#[async_trait]
impl Command for LsCommand {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        if !args.is_empty() {
            anyhow::bail!("ls: unexpected arguments: {}", args.join(" "));
        }
        let config = self.root.config();
        let lake = self.root.open_lake(&config.lake, &config)?;
        let (ctx, cleanup) = self.root.init(Vec::new())?;
        let result = lake.list_pools(&ctx).await;
        cleanup.run().await;
        let long = self.long.get();
        for pool in result? {
            output::print(format_pool(&pool, long));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn long_format_lists_branches() {
        let pool = PoolInfo {
            id: "abc".into(),
            name: "logs".into(),
            created: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            branches: vec!["dev".into(), "main".into()],
        };
        assert_eq!(format_pool(&pool, false), "logs");
        assert_eq!(
            format_pool(&pool, true),
            "logs abc 2024-05-01T12:00:00Z [dev, main]"
        );
    }
}
