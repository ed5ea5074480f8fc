//! cli::root
//!
//! The top-level `zed` command and the parent types leaf commands reach
//! their configuration through.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;

use super::Environment;
use crate::charm::{downcast, ByteSize, CharmError, Command, Flag, FlagSet, Spec};
use crate::core::config::{default_user, Config, DEFAULT_READ_SIZE, DEFAULT_SEEK_STRIDE};
use crate::core::paths::default_lake;
use crate::lake::{self, Lake};
use crate::signalctx::{self, Cleanup, Initializer, SignalContext};

const ROOT_LONG: &str = "
zed is a command-line tool for creating, configuring, ingesting into,
querying, and orchestrating Zed data lakes.

Commands act on the lake named by -lake, which defaults to $ZED_LAKE or a
directory in the user's data directory. Use 'zed serve' to run a lake
service and point -lake at its URL.

Most commands act on a pool and branch chosen with -use or recorded in
the working directory by 'zed use'.";

/// Default address of a lake service.
pub const DEFAULT_HOST: &str = "localhost:9867";

/// `zed`: holds the flags every command inherits.
pub struct RootCommand {
    env: Environment,
    lake: Flag<String>,
    config_dir: Flag<String>,
    read_size: Flag<ByteSize>,
    seek_stride: Flag<ByteSize>,
}

impl RootCommand {
    pub(crate) fn spec(env: Environment) -> Spec {
        Spec::new("zed", move |_, flags| {
            Ok(Arc::new(RootCommand::bind(env.clone(), flags)) as Arc<dyn Command>)
        })
        .usage("zed <command> [options] [arguments...]")
        .short("run Zed data lake commands")
        .long(ROOT_LONG)
        .hidden_flags("readsize,seekstride")
    }

    fn bind(env: Environment, flags: &mut FlagSet) -> Self {
        Self {
            env,
            lake: flags.string("lake", &default_lake(), "lake URI ($ZED_LAKE)"),
            config_dir: flags.string("configdir", "", "configuration and credentials directory"),
            read_size: flags.bytes("readsize", DEFAULT_READ_SIZE, "target read size for inputs"),
            seek_stride: flags.bytes(
                "seekstride",
                DEFAULT_SEEK_STRIDE,
                "seek index stride hint sent with loads",
            ),
        }
    }

    /// The configuration for this invocation.
    pub fn config(&self) -> Config {
        let config_dir = self.config_dir.get();
        Config {
            lake: self.lake.get(),
            user: default_user(),
            config_dir: (!config_dir.is_empty()).then(|| PathBuf::from(config_dir)),
            work_dir: self
                .env
                .work_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            read_size: self.read_size.get().get(),
            seek_stride: self.seek_stride.get().get(),
        }
    }

    /// Open the lake at `uri`, unless a lake was injected.
    pub fn open_lake(&self, uri: &str, config: &Config) -> anyhow::Result<Arc<dyn Lake>> {
        if let Some(lake) = &self.env.lake {
            return Ok(Arc::clone(lake));
        }
        if uri.is_empty() {
            return Err(anyhow!("no lake: use -lake or set $ZED_LAKE"));
        }
        lake::open(uri, config).with_context(|| format!("open lake {uri}"))
    }

    /// Run `initializers` and return the command context.
    pub fn init(
        &self,
        initializers: Vec<Box<dyn Initializer>>,
    ) -> anyhow::Result<(SignalContext, Cleanup)> {
        signalctx::init(initializers)
    }
}

#[async_trait]
impl Command for RootCommand {
    async fn run(&self, _args: Vec<String>) -> anyhow::Result<()> {
        Err(CharmError::NoRun.into())
    }
}

/// `zed api`: reaches a lake service by host name.
pub struct ApiCommand {
    root: Arc<RootCommand>,
    host: Flag<String>,
}

impl ApiCommand {
    pub(crate) fn spec() -> Spec {
        Spec::new("api", |parent, flags| {
            let root = downcast::<RootCommand>(parent)
                .ok_or_else(|| anyhow!("api must be attached under zed"))?;
            Ok(Arc::new(ApiCommand {
                root,
                host: flags.string("host", DEFAULT_HOST, "lake service host[:port]"),
            }) as Arc<dyn Command>)
        })
        .usage("api <command> [options] [arguments...]")
        .short("run commands against a lake service")
        .long(
            "
The api commands act on the lake service at -host instead of the lake
named by -lake. They accept the same options as the top-level commands.",
        )
    }

    /// The service URL for `-host`.
    pub fn url(&self) -> String {
        let host = self.host.get();
        if host.contains("://") {
            host
        } else {
            format!("http://{host}")
        }
    }
}

#[async_trait]
impl Command for ApiCommand {
    async fn run(&self, _args: Vec<String>) -> anyhow::Result<()> {
        Err(CharmError::NoRun.into())
    }
}

/// The parent of a command attached under both `zed` and `zed api`.
#[derive(Clone)]
pub enum LakeParent {
    Root(Arc<RootCommand>),
    Api(Arc<ApiCommand>),
}

impl LakeParent {
    pub fn from_parent(parent: Option<Arc<dyn Command>>) -> anyhow::Result<Self> {
        let parent = parent.ok_or_else(|| anyhow!("command must be attached under zed"))?;
        if let Some(root) = downcast::<RootCommand>(Some(Arc::clone(&parent))) {
            return Ok(LakeParent::Root(root));
        }
        downcast::<ApiCommand>(Some(parent))
            .map(LakeParent::Api)
            .ok_or_else(|| anyhow!("command must be attached under zed or zed api"))
    }

    pub fn root(&self) -> &RootCommand {
        match self {
            LakeParent::Root(root) => root,
            LakeParent::Api(api) => &api.root,
        }
    }

    /// The lake URI this command acts on.
    pub fn lake_uri(&self, config: &Config) -> String {
        match self {
            LakeParent::Root(_) => config.lake.clone(),
            LakeParent::Api(api) => api.url(),
        }
    }

    /// Configuration and an open lake.
    pub fn open(&self) -> anyhow::Result<(Config, Arc<dyn Lake>)> {
        let root = self.root();
        let mut config = root.config();
        config.lake = self.lake_uri(&config);
        let lake = root.open_lake(&config.lake, &config)?;
        Ok((config, lake))
    }
}

/// Recover the root command from a direct child's parent.
pub(crate) fn root_of(parent: Option<Arc<dyn Command>>) -> anyhow::Result<Arc<RootCommand>> {
    downcast::<RootCommand>(parent).ok_or_else(|| anyhow!("command must be attached under zed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charm::ParseMode;

    fn root_with(args: &[&str]) -> Arc<RootCommand> {
        let mut flags = FlagSet::new("zed");
        let root = Arc::new(RootCommand::bind(Environment::default(), &mut flags));
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        flags.parse(&args, ParseMode::Strict).unwrap();
        root
    }

    #[test]
    fn config_reflects_flags() {
        let root = root_with(&["-lake", "http://lake:9867", "-configdir", "/tmp/z", "-readsize", "1MiB"]);
        let config = root.config();
        assert_eq!(config.lake, "http://lake:9867");
        assert_eq!(config.config_dir, Some(PathBuf::from("/tmp/z")));
        assert_eq!(config.read_size, 1024 * 1024);
        assert_eq!(config.seek_stride, DEFAULT_SEEK_STRIDE);
    }

    #[test]
    fn lake_parent_resolves_root_and_api() {
        let root = root_with(&["-lake", "memory:"]);
        let parent = LakeParent::from_parent(Some(root.clone() as Arc<dyn Command>)).unwrap();
        assert_eq!(parent.lake_uri(&parent.root().config()), "memory:");

        let mut flags = FlagSet::new("api");
        let api = Arc::new(ApiCommand {
            root,
            host: flags.string("host", DEFAULT_HOST, ""),
        });
        let parent = LakeParent::from_parent(Some(api as Arc<dyn Command>)).unwrap();
        assert_eq!(
            parent.lake_uri(&parent.root().config()),
            "http://localhost:9867"
        );
        assert!(LakeParent::from_parent(None).is_err());
    }

    #[test]
    fn empty_lake_is_an_error() {
        let root = root_with(&["-lake", ""]);
        let config = root.config();
        let err = root.open_lake(&config.lake, &config).err().unwrap();
        assert!(err.to_string().contains("-lake"));
    }
}
