//! lake
//!
//! The data-lake handle commands talk to.
//!
//! # Modules
//!
//! - [`memory`] - In-process lake used by `serve` and tests
//! - [`remote`] - HTTP client for a lake service
//! - [`service`] - HTTP routes exposing any [`Lake`]
//!
//! # Design
//!
//! Commands see the lake only through the [`Lake`] trait. [`open`] picks an
//! implementation from the lake URI: `http://` and `https://` reach a
//! service, `memory:` is a fresh in-process lake, and anything else is a
//! local path. The local storage engine is not part of this build, so paths
//! are reported as unsupported.

pub mod memory;
pub mod remote;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AuthError, CredentialStore};
use crate::core::commitish::Commitish;
use crate::core::config::Config;
use crate::signalctx::{Canceled, SignalContext};

pub use memory::MemoryLake;
pub use remote::RemoteLake;

/// Errors returned by lake operations.
#[derive(Debug, Error)]
pub enum LakeError {
    #[error("{0}: not found")]
    NotFound(String),

    #[error("{0}: already exists")]
    Exists(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}: local lake storage is not available in this build; run 'zed serve' and use -lake http://host:port")]
    LocalUnsupported(String),

    #[error("lake service error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("lake request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Canceled(#[from] Canceled),
}

impl From<reqwest::Error> for LakeError {
    fn from(err: reqwest::Error) -> Self {
        LakeError::Transport(err.to_string())
    }
}

/// A pool as listed by the lake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub branches: Vec<String>,
}

/// Metadata recorded with a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub author: String,
    pub message: String,
    /// Bytes between seek index entries, 0 for the lake's default.
    #[serde(default)]
    pub seek_stride: u64,
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub size: u64,
}

/// Streamed query results.
#[async_trait]
pub trait QueryStream: Send {
    /// The next chunk of output, or `None` at the end.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LakeError>;
}

/// Operations commands perform against a lake.
#[async_trait]
pub trait Lake: Send + Sync {
    async fn create_pool(&self, ctx: &SignalContext, name: &str) -> Result<PoolInfo, LakeError>;

    async fn list_pools(&self, ctx: &SignalContext) -> Result<Vec<PoolInfo>, LakeError>;

    async fn branch_exists(&self, ctx: &SignalContext, head: &Commitish)
        -> Result<bool, LakeError>;

    /// Create `head`'s branch from `base`, another branch in the same pool.
    async fn create_branch(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
        base: &str,
    ) -> Result<(), LakeError>;

    /// Append `data` to `head` as one commit.
    async fn load(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
        data: Vec<u8>,
        meta: CommitMeta,
    ) -> Result<Commit, LakeError>;

    /// Run `query`. `head` is the default source when the query names none.
    async fn query(
        &self,
        ctx: &SignalContext,
        head: Option<&Commitish>,
        query: &str,
    ) -> Result<Box<dyn QueryStream>, LakeError>;
}

/// Open the lake named by `uri`.
pub fn open(uri: &str, config: &Config) -> anyhow::Result<Arc<dyn Lake>> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        let token = access_token(uri, config)?;
        return Ok(Arc::new(RemoteLake::new(uri, token)?));
    }
    if uri == "memory:" {
        return Ok(Arc::new(MemoryLake::new()));
    }
    Err(LakeError::LocalUnsupported(uri.to_string()).into())
}

fn access_token(endpoint: &str, config: &Config) -> Result<Option<String>, AuthError> {
    let store = match CredentialStore::new(config.config_dir.as_deref()) {
        Ok(store) => store,
        Err(AuthError::NoConfigDir) => return Ok(None),
        Err(err) => return Err(err),
    };
    let creds = store.load()?;
    Ok(creds
        .lookup(endpoint)
        .map(|tokens| tokens.access.clone())
        .filter(|access| !access.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Tokens;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config {
            config_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        }
    }

    #[test]
    fn local_paths_are_unsupported() {
        let dir = TempDir::new().unwrap();
        let err = open("/var/lib/zed", &config_in(&dir)).err().unwrap();
        assert!(err.to_string().contains("not available in this build"));
    }

    #[test]
    fn memory_and_http_schemes_open() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert!(open("memory:", &config).is_ok());
        assert!(open("http://localhost:9867", &config).is_ok());
    }

    #[test]
    fn access_token_comes_from_store() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert_eq!(access_token("http://lake", &config).unwrap(), None);

        let store = CredentialStore::new(Some(dir.path())).unwrap();
        let mut creds = store.load().unwrap();
        creds.add("http://lake", Tokens::new("T1"));
        store.save(&creds).unwrap();

        assert_eq!(
            access_token("http://lake", &config).unwrap().as_deref(),
            Some("T1")
        );
        assert_eq!(access_token("http://other", &config).unwrap(), None);
    }
}
