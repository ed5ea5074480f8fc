//! cli::commands::load
//!
//! `zed load`: commit data from files or standard input to a branch.
//!
//! # Design
//!
//! Inputs are read fully before anything is sent, so a failed input (with
//! `-e`, the default) leaves the branch untouched. With `-e=false` failed
//! inputs become warnings and the rest are committed.
//!
//! When standard error is a terminal a status line shows bytes read, and
//! warnings are printed above it.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::charm::{CharmError, Command, Flag, Spec};
use crate::cli::root::LakeParent;
use crate::core::config::default_user;
use crate::core::head::require_head;
use crate::display::{Display, Progress, DEFAULT_INTERVAL};
use crate::lake::CommitMeta;
use crate::ui::output;
use crate::zio::{self, InputFlags};

struct LoadCommand {
    parent: LakeParent,
    use_flag: Flag<String>,
    message: Flag<String>,
    user: Flag<String>,
    inputs: InputFlags,
}

pub fn spec() -> Spec {
    Spec::new("load", |parent, flags| {
        Ok(Arc::new(LoadCommand {
            parent: LakeParent::from_parent(parent)?,
            use_flag: flags.string("use", "", "commit to pool[@branch] instead of HEAD"),
            message: flags.string("message", "", "commit message"),
            user: flags.string("user", &default_user(), "commit author"),
            inputs: InputFlags::bind(flags),
        }) as Arc<dyn Command>)
    })
    .usage("load [options] file|- ...")
    .short("add and commit data to a branch")
    .long(
        "
The load command commits new data to a branch of a pool. Each argument is
a file path, or - for standard input.

The branch is the one named by -use, or the HEAD recorded by 'zed use'.
Run 'zed query' to read the data back.",
    )
}

#[async_trait]
impl Command for LoadCommand {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        if args.is_empty() {
            return Err(CharmError::NeedHelp.into());
        }
        let (config, lake) = self.parent.open()?;
        let head = require_head(&self.use_flag.get(), &config.work_dir)?;
        let (ctx, cleanup) = self.parent.root().init(Vec::new())?;

        let progress = Arc::new(Progress::new());
        let display = io::stderr().is_terminal().then(|| {
            let progress = Arc::clone(&progress);
            Display::start(
                &ctx,
                move |buf: &mut String| {
                    buf.push_str(&progress.status_line());
                    true
                },
                DEFAULT_INTERVAL,
                Box::new(io::stderr()),
            )
        });

        let result = async {
            let opened = zio::open_inputs(
                &ctx,
                &args,
                self.inputs.format(),
                config.read_size as usize,
                Some(progress.as_ref()),
                self.inputs.stop_on_error(),
            )
            .await?;
            report_warnings(display.as_ref(), &opened.warnings);
            if opened.inputs.is_empty() {
                bail!("no data loaded");
            }
            let meta = CommitMeta {
                author: self.user.get(),
                message: self.message.get(),
                seek_stride: config.seek_stride,
            };
            Ok::<_, anyhow::Error>(lake.load(&ctx, &head, opened.concat(), meta).await?)
        }
        .await;

        if let Some(display) = &display {
            display.close();
            display.done().await;
        }
        cleanup.run().await;

        let commit = result?;
        tracing::info!(head = %head, commit = %commit.id, size = commit.size, "committed");
        output::print(format!("{} committed", commit.id));
        Ok(())
    }
}

fn report_warnings(display: Option<&Display>, warnings: &[String]) {
    match display {
        Some(display) => {
            let mut bypass = display.bypass();
            for warning in warnings {
                if output::warn_to(&mut bypass, warning).is_err() {
                    break;
                }
            }
            let _ = bypass.flush();
        }
        None => warnings.iter().for_each(output::warn),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{build_with, Environment};
    use crate::core::commitish::Commitish;
    use crate::core::head::write_head;
    use crate::lake::{Lake, MemoryLake};
    use crate::signalctx::SignalContext;
    use std::fs;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn setup() -> (TempDir, Arc<MemoryLake>, Arc<Spec>) {
        let dir = TempDir::new().unwrap();
        let lake = Arc::new(MemoryLake::new());
        lake.create_pool(&SignalContext::background(), "logs")
            .await
            .unwrap();
        let root = build_with(Environment {
            lake: Some(lake.clone()),
            work_dir: Some(dir.path().to_path_buf()),
        });
        (dir, lake, root)
    }

    #[tokio::test]
    async fn loads_files_to_head() {
        let (dir, lake, root) = setup().await;
        let head = Commitish::new("logs", "main");
        write_head(dir.path(), &head).unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{\"a\":1}\n").unwrap();

        crate::charm::exec(
            &root,
            args(&["load", "-message", "first", "-user", "ann", file.to_str().unwrap()]),
        )
        .await
        .unwrap();

        let history = lake.history(&head).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].author, "ann");
        assert_eq!(history[0].message, "first");
    }

    #[tokio::test]
    async fn use_flag_overrides_head() {
        let (dir, lake, root) = setup().await;
        let ctx = SignalContext::background();
        let dev = Commitish::new("logs", "dev");
        lake.create_branch(&ctx, &dev, "main").await.unwrap();
        write_head(dir.path(), &Commitish::new("logs", "main")).unwrap();
        let file = dir.path().join("x.txt");
        fs::write(&file, "line\n").unwrap();

        crate::charm::exec(&root, args(&["load", "-use", "logs@dev", file.to_str().unwrap()]))
            .await
            .unwrap();

        assert_eq!(lake.commit_count(&dev).await, Some(1));
        assert_eq!(lake.commit_count(&Commitish::new("logs", "main")).await, Some(0));
    }

    #[tokio::test]
    async fn missing_input_fails_unless_warnings_allowed() {
        let (dir, lake, root) = setup().await;
        let head = Commitish::new("logs", "main");
        let good = dir.path().join("good.txt");
        fs::write(&good, "ok\n").unwrap();
        let missing = dir.path().join("missing.txt");
        let good = good.to_str().unwrap();
        let missing = missing.to_str().unwrap();

        let err = crate::charm::exec(&root, args(&["load", "-use", "logs", good, missing]))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("missing.txt"));
        assert_eq!(lake.commit_count(&head).await, Some(0));

        crate::charm::exec(&root, args(&["load", "-use", "logs", "-e=false", good, missing]))
            .await
            .unwrap();
        assert_eq!(lake.commit_count(&head).await, Some(1));
    }

    #[tokio::test]
    async fn no_inputs_needs_help() {
        let (_dir, _lake, root) = setup().await;
        let mut out = Vec::new();
        crate::charm::exec_to(&root, args(&["load"]), &mut out)
            .await
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("load [options]"));
    }
}
