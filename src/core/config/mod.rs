//! core::config
//!
//! The configuration record threaded through command construction, and the
//! optional TOML file read by `zed serve -config`.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Environment (`ZED_LAKE`, `ZED_USER`, `USER`)
//! 3. Config file (`serve -config` only)
//! 4. Command-line flags
//!
//! # Example
//!
//! ```
//! use zedcli::core::config::ServeConfig;
//!
//! let config: ServeConfig = toml::from_str(r#"
//! listen = "127.0.0.1:9867"
//! shutdown_timeout = "10s"
//! "#).unwrap();
//! assert_eq!(config.listen.as_deref(), Some("127.0.0.1:9867"));
//! ```

pub mod schema;

pub use schema::ServeConfig;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::ZedPaths;
use crate::core::CoreError;

/// Default read buffer size for input files.
pub const DEFAULT_READ_SIZE: u64 = 512 * 1024;

/// Default seek stride hint sent with queries.
pub const DEFAULT_SEEK_STRIDE: u64 = 64 * 1024;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Settings shared by every command of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Lake URI (`http://...`, `memory:` or a path).
    pub lake: String,
    /// Author recorded on commits.
    pub user: String,
    /// Explicit configuration directory from `-configdir`.
    pub config_dir: Option<PathBuf>,
    /// Directory holding `.zed_head`.
    pub work_dir: PathBuf,
    pub read_size: u64,
    pub seek_stride: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lake: crate::core::paths::default_lake(),
            user: default_user(),
            config_dir: None,
            work_dir: PathBuf::from("."),
            read_size: DEFAULT_READ_SIZE,
            seek_stride: DEFAULT_SEEK_STRIDE,
        }
    }
}

impl Config {
    /// Paths derived from the configuration directory.
    pub fn paths(&self) -> Result<ZedPaths, CoreError> {
        ZedPaths::resolve(self.config_dir.as_deref())
    }
}

/// `$ZED_USER`, else the login name, else `unknown`.
pub fn default_user() -> String {
    ["ZED_USER", "USER", "USERNAME"]
        .iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Read and validate a serve config file.
pub fn load_serve_config(path: &Path) -> Result<ServeConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ServeConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}
