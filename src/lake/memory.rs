//! lake::memory
//!
//! An in-process lake.
//!
//! Pools hold named branches and branches hold commits of raw bytes. There
//! is no query engine: a query selects a source branch (`from pool@branch`
//! or the caller's HEAD) and may pass its data through unchanged with
//! `pass` or `*`. The result is the source's commits in load order.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Commit, CommitMeta, Lake, LakeError, PoolInfo, QueryStream};
use crate::core::commitish::{Commitish, DEFAULT_BRANCH};
use crate::signalctx::SignalContext;

#[derive(Debug, Clone)]
struct StoredCommit {
    id: String,
    meta: CommitMeta,
    data: Vec<u8>,
}

#[derive(Debug)]
struct Pool {
    id: String,
    created: chrono::DateTime<Utc>,
    branches: BTreeMap<String, Vec<StoredCommit>>,
}

impl Pool {
    fn info(&self, name: &str) -> PoolInfo {
        PoolInfo {
            id: self.id.clone(),
            name: name.to_string(),
            created: self.created,
            branches: self.branches.keys().cloned().collect(),
        }
    }
}

/// A lake that lives in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryLake {
    pools: Mutex<BTreeMap<String, Pool>>,
}

impl MemoryLake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits on `head`, or `None` if the branch does not exist.
    pub async fn commit_count(&self, head: &Commitish) -> Option<usize> {
        let pools = self.pools.lock().await;
        pools
            .get(head.pool())?
            .branches
            .get(head.branch())
            .map(Vec::len)
    }

    /// Author and message of each commit on `head`, oldest first.
    pub async fn history(&self, head: &Commitish) -> Result<Vec<CommitMeta>, LakeError> {
        let pools = self.pools.lock().await;
        let commits = branch(&pools, head)?;
        Ok(commits.iter().map(|commit| commit.meta.clone()).collect())
    }
}

fn branch<'a>(
    pools: &'a BTreeMap<String, Pool>,
    head: &Commitish,
) -> Result<&'a Vec<StoredCommit>, LakeError> {
    pools
        .get(head.pool())
        .ok_or_else(|| LakeError::NotFound(format!("pool {}", head.pool())))?
        .branches
        .get(head.branch())
        .ok_or_else(|| LakeError::NotFound(format!("branch {head}")))
}

/// Resolve the branch a query reads from.
fn query_source(query: &str, head: Option<&Commitish>) -> Result<Commitish, LakeError> {
    let mut source = head.cloned();
    for op in query.split('|').map(str::trim).filter(|op| !op.is_empty()) {
        if let Some(rest) = op.strip_prefix("from ") {
            let commitish =
                Commitish::parse(rest.trim()).map_err(|e| LakeError::Invalid(e.to_string()))?;
            source = Some(commitish);
        } else if op != "pass" && op != "*" {
            return Err(LakeError::Invalid(format!(
                "unsupported operator in memory lake: {op}"
            )));
        }
    }
    source.ok_or_else(|| {
        LakeError::Invalid("query has no data source: pass -use or 'from <pool>'".to_string())
    })
}

struct Chunks(VecDeque<Vec<u8>>);

#[async_trait]
impl QueryStream for Chunks {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LakeError> {
        Ok(self.0.pop_front())
    }
}

#[async_trait]
impl Lake for MemoryLake {
    async fn create_pool(&self, ctx: &SignalContext, name: &str) -> Result<PoolInfo, LakeError> {
        ctx.check()?;
        if name.is_empty() || name.contains('@') || name.contains(char::is_whitespace) {
            return Err(LakeError::Invalid(format!("invalid pool name '{name}'")));
        }
        let mut pools = self.pools.lock().await;
        if pools.contains_key(name) {
            return Err(LakeError::Exists(format!("pool {name}")));
        }
        let pool = Pool {
            id: Uuid::new_v4().simple().to_string(),
            created: Utc::now(),
            branches: BTreeMap::from([(DEFAULT_BRANCH.to_string(), Vec::new())]),
        };
        let info = pool.info(name);
        pools.insert(name.to_string(), pool);
        tracing::debug!(pool = name, "created pool");
        Ok(info)
    }

    async fn list_pools(&self, ctx: &SignalContext) -> Result<Vec<PoolInfo>, LakeError> {
        ctx.check()?;
        let pools = self.pools.lock().await;
        Ok(pools.iter().map(|(name, pool)| pool.info(name)).collect())
    }

    async fn branch_exists(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
    ) -> Result<bool, LakeError> {
        ctx.check()?;
        let pools = self.pools.lock().await;
        match pools.get(head.pool()) {
            Some(pool) => Ok(pool.branches.contains_key(head.branch())),
            None => Err(LakeError::NotFound(format!("pool {}", head.pool()))),
        }
    }

    async fn create_branch(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
        base: &str,
    ) -> Result<(), LakeError> {
        ctx.check()?;
        let mut pools = self.pools.lock().await;
        let pool = pools
            .get_mut(head.pool())
            .ok_or_else(|| LakeError::NotFound(format!("pool {}", head.pool())))?;
        if pool.branches.contains_key(head.branch()) {
            return Err(LakeError::Exists(format!("branch {head}")));
        }
        let commits = pool
            .branches
            .get(base)
            .cloned()
            .ok_or_else(|| LakeError::NotFound(format!("branch {}", head.with_branch(base))))?;
        pool.branches.insert(head.branch().to_string(), commits);
        Ok(())
    }

    async fn load(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
        data: Vec<u8>,
        meta: CommitMeta,
    ) -> Result<Commit, LakeError> {
        ctx.check()?;
        let mut pools = self.pools.lock().await;
        let commits = pools
            .get_mut(head.pool())
            .ok_or_else(|| LakeError::NotFound(format!("pool {}", head.pool())))?
            .branches
            .get_mut(head.branch())
            .ok_or_else(|| LakeError::NotFound(format!("branch {head}")))?;
        let commit = Commit {
            id: Uuid::new_v4().simple().to_string(),
            size: data.len() as u64,
        };
        commits.push(StoredCommit {
            id: commit.id.clone(),
            meta,
            data,
        });
        tracing::debug!(head = %head, commit = %commit.id, size = commit.size, "loaded");
        Ok(commit)
    }

    async fn query(
        &self,
        ctx: &SignalContext,
        head: Option<&Commitish>,
        query: &str,
    ) -> Result<Box<dyn QueryStream>, LakeError> {
        ctx.check()?;
        let source = query_source(query, head)?;
        let pools = self.pools.lock().await;
        let commits = branch(&pools, &source)?;
        tracing::trace!(source = %source, commits = commits.len(), first = ?commits.first().map(|c| &c.id), "query");
        Ok(Box::new(Chunks(
            commits.iter().map(|commit| commit.data.clone()).collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut stream: Box<dyn QueryStream>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            out.extend(chunk);
        }
        out
    }

    fn meta(message: &str) -> CommitMeta {
        CommitMeta {
            author: "tester".into(),
            message: message.into(),
            seek_stride: 0,
        }
    }

    #[tokio::test]
    async fn pools_start_with_main_branch() {
        let ctx = SignalContext::background();
        let lake = MemoryLake::new();
        let info = lake.create_pool(&ctx, "logs").await.unwrap();
        assert_eq!(info.branches, vec!["main".to_string()]);
        assert!(lake
            .branch_exists(&ctx, &Commitish::new("logs", "main"))
            .await
            .unwrap());
        assert!(matches!(
            lake.create_pool(&ctx, "logs").await,
            Err(LakeError::Exists(_))
        ));
        assert_eq!(lake.list_pools(&ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_then_query_returns_data_in_order() {
        let ctx = SignalContext::background();
        let lake = MemoryLake::new();
        lake.create_pool(&ctx, "logs").await.unwrap();
        let head = Commitish::new("logs", "main");
        lake.load(&ctx, &head, b"a\n".to_vec(), meta("one"))
            .await
            .unwrap();
        lake.load(&ctx, &head, b"b\n".to_vec(), meta("two"))
            .await
            .unwrap();

        let out = drain(lake.query(&ctx, Some(&head), "pass").await.unwrap()).await;
        assert_eq!(out, b"a\nb\n");
        let out = drain(lake.query(&ctx, None, "from logs | *").await.unwrap()).await;
        assert_eq!(out, b"a\nb\n");

        let history = lake.history(&head).await.unwrap();
        assert_eq!(history[1].message, "two");
    }

    #[tokio::test]
    async fn branch_copies_base() {
        let ctx = SignalContext::background();
        let lake = MemoryLake::new();
        lake.create_pool(&ctx, "p").await.unwrap();
        let main = Commitish::new("p", "main");
        lake.load(&ctx, &main, b"x".to_vec(), meta("m")).await.unwrap();

        let dev = main.with_branch("dev");
        lake.create_branch(&ctx, &dev, "main").await.unwrap();
        assert_eq!(lake.commit_count(&dev).await, Some(1));
        assert!(matches!(
            lake.create_branch(&ctx, &dev, "main").await,
            Err(LakeError::Exists(_))
        ));
        assert!(matches!(
            lake.create_branch(&ctx, &main.with_branch("x"), "nope").await,
            Err(LakeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn query_needs_a_source() {
        let ctx = SignalContext::background();
        let lake = MemoryLake::new();
        assert!(matches!(
            lake.query(&ctx, None, "pass").await,
            Err(LakeError::Invalid(_))
        ));
        assert!(matches!(
            lake.query(&ctx, None, "from p | sort").await,
            Err(LakeError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn canceled_context_fails_fast() {
        let ctx = SignalContext::background();
        ctx.cancel();
        let lake = MemoryLake::new();
        assert!(matches!(
            lake.create_pool(&ctx, "p").await,
            Err(LakeError::Canceled(_))
        ));
    }
}
