//! cli::commands::dev
//!
//! Hidden developer commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::charm::{format_duration, CharmError, Command, Flag, Spec};
use crate::cli::root::{root_of, RootCommand};

/// `zed dev`.
pub struct DevCommand {
    root: Arc<RootCommand>,
}

#[async_trait]
impl Command for DevCommand {
    async fn run(&self, _args: Vec<String>) -> Result<()> {
        Err(CharmError::NoRun.into())
    }
}

pub fn spec() -> Spec {
    Spec::new("dev", |parent, _| {
        Ok(Arc::new(DevCommand {
            root: root_of(parent)?,
        }) as Arc<dyn Command>)
    })
    .usage("dev <command> [options]")
    .short("developer commands")
    .hidden()
}

/// `zed dev sleep`: wait, honoring signals.
struct SleepCommand {
    dev: Arc<DevCommand>,
    duration: Flag<Duration>,
}

pub fn sleep_spec() -> Spec {
    Spec::new("sleep", |parent, flags| {
        let dev = crate::charm::downcast::<DevCommand>(parent)
            .ok_or_else(|| anyhow::anyhow!("sleep must be attached under zed dev"))?;
        Ok(Arc::new(SleepCommand {
            dev,
            duration: flags.duration("d", Duration::from_secs(10), "how long to sleep"),
        }) as Arc<dyn Command>)
    })
    .usage("dev sleep [-d duration]")
    .short("sleep until the duration passes or a signal arrives")
}

#[async_trait]
impl Command for SleepCommand {
    async fn run(&self, _args: Vec<String>) -> Result<()> {
        let duration = self.duration.get();
        let (ctx, cleanup) = self.dev.root.init(Vec::new())?;
        tracing::debug!(duration = %format_duration(duration), "sleeping");
        let result = tokio::select! {
            cause = ctx.done() => Err(cause.into()),
            _ = tokio::time::sleep(duration) => Ok(()),
        };
        cleanup.run().await;
        result
    }
}
