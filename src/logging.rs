//! logging
//!
//! Diagnostic logging to standard error.
//!
//! The filter comes from `ZED_LOG` (an `EnvFilter` directive such as
//! `debug` or `zedcli::httpd=trace`) and defaults to `warn`. `zed serve`
//! replaces it at runtime with its `-log.level` setting.

use std::sync::OnceLock;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "ZED_LOG";

/// Filter used when `ZED_LOG` is unset or invalid.
pub const DEFAULT_LEVEL: &str = "warn";

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init() {
    let filter = filter_from(std::env::var(LOG_ENV).ok().as_deref());
    let (filter, handle) = reload::Layer::new(filter);
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
    if installed.is_ok() {
        let _ = FILTER.set(handle);
    }
}

/// Parse a filter directive, falling back to [`DEFAULT_LEVEL`].
pub fn filter_from(directive: Option<&str>) -> EnvFilter {
    directive
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
}

/// Replace the active filter.
pub fn set_level(directive: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("invalid log level {directive:?}"))?;
    if let Some(handle) = FILTER.get() {
        handle
            .reload(filter)
            .context("failed to update log filter")?;
    }
    Ok(())
}
