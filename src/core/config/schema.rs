//! core::config::schema
//!
//! Schema of the file read by `zed serve -config`.
//!
//! ```toml
//! log_level = "info"
//! listen = "localhost:9867"
//! shutdown_timeout = "5s"
//! portfile = "/run/zed/port"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::charm::parse_duration;

/// Settings for `zed serve`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// Tracing filter, e.g. `info` or `zedcli=debug`.
    pub log_level: Option<String>,

    /// Listen address.
    pub listen: Option<String>,

    /// Shutdown deadline as a duration string.
    pub shutdown_timeout: Option<String>,

    /// File that receives the bound port number.
    pub portfile: Option<PathBuf>,
}

impl ServeConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shutdown_timeout()?;
        if let Some(listen) = &self.listen {
            if listen.trim().is_empty() {
                return Err(ConfigError::InvalidValue("listen must not be empty".into()));
            }
        }
        Ok(())
    }

    /// The parsed shutdown deadline, if set.
    pub fn shutdown_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.shutdown_timeout
            .as_deref()
            .map(|raw| {
                parse_duration(raw)
                    .map_err(|e| ConfigError::InvalidValue(format!("shutdown_timeout: {e}")))
            })
            .transpose()
    }
}
