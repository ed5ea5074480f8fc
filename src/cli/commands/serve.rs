//! cli::commands::serve
//!
//! `zed serve`: run a lake service over HTTP.
//!
//! # Design
//!
//! Settings come from flags and an optional TOML file given with
//! `-config`. A flag that is set wins over the file; anything set in
//! neither falls back to the defaults below. The service is backed by an
//! in-process lake and runs until SIGINT or SIGTERM, then drains in-flight
//! requests within the shutdown deadline.
//!
//! # Example
//!
//! ```bash
//! zed serve -l 127.0.0.1:0 -portfile /tmp/zed.port -log.level info
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::charm::{Command, Flag, Spec};
use crate::cli::root::{root_of, RootCommand, DEFAULT_HOST};
use crate::core::config::{load_serve_config, schema::ServeConfig};
use crate::httpd::{Server, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::lake::service;
use crate::logging;
use crate::ui::output;

struct ServeCommand {
    root: Arc<RootCommand>,
    listen: Flag<String>,
    portfile: Flag<String>,
    shutdown_timeout: Flag<Duration>,
    log_level: Flag<String>,
    config: Flag<String>,
}

pub fn spec() -> Spec {
    Spec::new("serve", |parent, flags| {
        Ok(Arc::new(ServeCommand {
            root: root_of(parent)?,
            listen: flags.string("l", "", &format!("listen address (default {DEFAULT_HOST})")),
            portfile: flags.string("portfile", "", "write listen port to file"),
            shutdown_timeout: flags.duration(
                "shutdowntimeout",
                Duration::ZERO,
                "deadline for draining requests on shutdown (default 5s)",
            ),
            log_level: flags.string("log.level", "", "logging filter, e.g. info or zedcli=debug"),
            config: flags.string("config", "", "TOML file with serve settings"),
        }) as Arc<dyn Command>)
    })
    .usage("serve [options]")
    .short("run a lake service")
    .long(
        "
The serve command runs an HTTP service that other zed commands reach with
-lake http://host:port or 'zed api -host host:port'. The service keeps its
pools in memory for the life of the process.

Settings may also be read from a TOML file with -config, using the keys
listen, portfile, shutdown_timeout and log_level. Flags override the file.",
    )
}

/// Effective serve settings after merging flags over the file.
#[derive(Debug, PartialEq, Eq)]
struct Settings {
    listen: String,
    portfile: Option<PathBuf>,
    shutdown_timeout: Duration,
    log_level: Option<String>,
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

impl ServeCommand {
    fn settings(&self) -> Result<Settings> {
        let file = match non_empty(self.config.get()) {
            Some(path) => load_serve_config(Path::new(&path))?,
            None => ServeConfig::default(),
        };
        merge(
            file,
            self.listen.get(),
            self.portfile.get(),
            self.shutdown_timeout.get(),
            self.log_level.get(),
        )
    }
}

fn merge(
    file: ServeConfig,
    listen: String,
    portfile: String,
    shutdown_timeout: Duration,
    log_level: String,
) -> Result<Settings> {
    let file_timeout = file.shutdown_timeout()?;
    Ok(Settings {
        listen: non_empty(listen)
            .or(file.listen)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        portfile: non_empty(portfile).map(PathBuf::from).or(file.portfile),
        shutdown_timeout: if shutdown_timeout.is_zero() {
            file_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
        } else {
            shutdown_timeout
        },
        log_level: non_empty(log_level).or(file.log_level),
    })
}

#[async_trait]
impl Command for ServeCommand {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        if !args.is_empty() {
            anyhow::bail!("serve takes no arguments");
        }
        let settings = self.settings()?;
        if let Some(level) = &settings.log_level {
            logging::set_level(level)?;
        }
        let config = self.root.config();
        let lake = self.root.open_lake("memory:", &config)?;

        let (ctx, cleanup) = self.root.init(Vec::new())?;
        let mut server = Server::new(settings.listen.clone(), service::routes(lake))
            .with_shutdown_timeout(settings.shutdown_timeout);
        let result = async {
            let addr = server.start(&ctx).await?;
            if let Some(path) = &settings.portfile {
                server.write_port_file(path)?;
            }
            output::note(format!("listening on http://{addr}"));
            server.wait().await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;

        if let Some(signal) = ctx.caught() {
            tracing::info!(signal = %signal, "serve stopped by signal");
        }
        cleanup.run().await;
        result
    }
}
