//! core::paths
//!
//! Centralized path routing for zed's on-disk state.
//!
//! # Storage Layout
//!
//! - `<config_dir>/credentials.json` - stored lake credentials
//! - `<cwd>/.zed_head` - the pool and branch commands act on by default
//! - `<data_dir>/zed/lake` - default lake location when `ZED_LAKE` is unset
//!
//! The configuration directory is `-configdir` when given, otherwise the
//! platform configuration directory plus `zed`.
//!
//! # Example
//!
//! ```
//! use zedcli::core::paths::ZedPaths;
//! use std::path::PathBuf;
//!
//! let paths = ZedPaths::new(PathBuf::from("/home/u/.config/zed"));
//! assert_eq!(
//!     paths.credentials_path(),
//!     PathBuf::from("/home/u/.config/zed/credentials.json")
//! );
//! ```

use std::env;
use std::path::{Path, PathBuf};

use super::CoreError;

/// File name of the credentials store inside the configuration directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// File name of the working-directory HEAD file.
pub const HEAD_FILE: &str = ".zed_head";

/// Environment variable naming the default lake.
pub const LAKE_ENV: &str = "ZED_LAKE";

/// Resolved locations of zed's per-user state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZedPaths {
    pub config_dir: PathBuf,
}

impl ZedPaths {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Resolve the configuration directory from an optional override.
    ///
    /// An empty override counts as unset.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, CoreError> {
        if let Some(dir) = explicit.filter(|dir| !dir.as_os_str().is_empty()) {
            return Ok(Self::new(dir.to_path_buf()));
        }
        if let Some(dir) = dirs::config_dir() {
            return Ok(Self::new(dir.join("zed")));
        }
        dirs::home_dir()
            .map(|home| Self::new(home_config_dir(&home)))
            .ok_or(CoreError::NoConfigDir)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }
}

#[cfg(windows)]
fn home_config_dir(home: &Path) -> PathBuf {
    home.join("AppData").join("Roaming").join("zed")
}

#[cfg(not(windows))]
fn home_config_dir(home: &Path) -> PathBuf {
    home.join(".config").join("zed")
}

/// Path of the HEAD file in `dir`.
pub fn head_path(dir: &Path) -> PathBuf {
    dir.join(HEAD_FILE)
}

/// Per-user data directory, from the process environment.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    data_dir_from(|key| env::var_os(key).map(PathBuf::from))
}

/// Per-user data directory, from `lookup`.
///
/// `LOCALAPPDATA` on Windows, `XDG_DATA_HOME` elsewhere, falling back to
/// `$HOME/.local/share`.
pub fn data_dir_from<F>(lookup: F) -> Result<PathBuf, CoreError>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let platform_var = if cfg!(windows) {
        "LOCALAPPDATA"
    } else {
        "XDG_DATA_HOME"
    };
    if let Some(dir) = lookup(platform_var).filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    lookup("HOME")
        .filter(|home| !home.as_os_str().is_empty())
        .map(|home| home.join(".local").join("share"))
        .ok_or(CoreError::NoDataDir)
}

/// The lake used when `-lake` is not given: `$ZED_LAKE`, else
/// `<data_dir>/zed/lake`.
pub fn default_lake() -> String {
    if let Some(lake) = env::var(LAKE_ENV).ok().filter(|l| !l.is_empty()) {
        return lake;
    }
    match data_dir() {
        Ok(dir) => dir.join("zed").join("lake").to_string_lossy().into_owned(),
        Err(_) => String::new(),
    }
}
