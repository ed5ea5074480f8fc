//! lake::service
//!
//! HTTP routes exposing a [`Lake`], served by `zed serve` and consumed by
//! [`super::RemoteLake`].
//!
//! # Routes
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | GET | `/status` | | `ok` |
//! | GET | `/version` | | `{"version": ...}` |
//! | GET | `/pool` | | `[PoolInfo]` |
//! | POST | `/pool` | `{"name"}` | `PoolInfo` |
//! | GET | `/pool/{pool}/branch/{branch}` | | `{"pool","branch"}` or 404 |
//! | POST | `/pool/{pool}/branch/{branch}` | `{"base"}` | 201 |
//! | POST | `/pool/{pool}/branch/{branch}/load` | raw data | `Commit` |
//! | POST | `/query` | `{"query","head"}` | result bytes |
//!
//! Errors are `{"error": message}` with a status derived from
//! [`LakeError`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{Commit, CommitMeta, Lake, LakeError, PoolInfo};
use crate::core::commitish::Commitish;
use crate::httpd::RequestContext;
use crate::signalctx::Canceled;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PoolRequest {
    pub(crate) name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BranchRequest {
    pub(crate) base: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct QueryRequest {
    pub(crate) query: String,
    #[serde(default)]
    pub(crate) head: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
struct BranchBody {
    pool: String,
    branch: String,
}

#[derive(Debug, Default, Deserialize)]
struct LoadParams {
    #[serde(default)]
    author: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    seekstride: u64,
}

impl IntoResponse for LakeError {
    fn into_response(self) -> Response {
        let status = match &self {
            LakeError::NotFound(_) => StatusCode::NOT_FOUND,
            LakeError::Exists(_) => StatusCode::CONFLICT,
            LakeError::Invalid(_) | LakeError::LocalUnsupported(_) => StatusCode::BAD_REQUEST,
            LakeError::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            LakeError::Transport(_) => StatusCode::BAD_GATEWAY,
            LakeError::Canceled(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Router serving `lake`.
pub fn routes(lake: Arc<dyn Lake>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/version", get(version))
        .route("/pool", get(list_pools).post(create_pool))
        .route(
            "/pool/{pool}/branch/{branch}",
            get(get_branch).post(create_branch),
        )
        .route(
            "/pool/{pool}/branch/{branch}/load",
            post(load).layer(DefaultBodyLimit::disable()),
        )
        .route("/query", post(query))
        .with_state(lake)
}

async fn status() -> &'static str {
    "ok"
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn list_pools(
    State(lake): State<Arc<dyn Lake>>,
    rc: RequestContext,
) -> Result<Json<Vec<PoolInfo>>, LakeError> {
    Ok(Json(lake.list_pools(&rc.ctx).await?))
}

async fn create_pool(
    State(lake): State<Arc<dyn Lake>>,
    rc: RequestContext,
    Json(req): Json<PoolRequest>,
) -> Result<Json<PoolInfo>, LakeError> {
    let info = lake.create_pool(&rc.ctx, &req.name).await?;
    tracing::info!(request_id = %rc.request_id, pool = %info.name, "pool created");
    Ok(Json(info))
}

async fn get_branch(
    State(lake): State<Arc<dyn Lake>>,
    rc: RequestContext,
    Path((pool, branch)): Path<(String, String)>,
) -> Result<Json<BranchBody>, LakeError> {
    let head = Commitish::new(pool, branch);
    if !lake.branch_exists(&rc.ctx, &head).await? {
        return Err(LakeError::NotFound(format!("branch {head}")));
    }
    Ok(Json(BranchBody {
        pool: head.pool().to_string(),
        branch: head.branch().to_string(),
    }))
}

async fn create_branch(
    State(lake): State<Arc<dyn Lake>>,
    rc: RequestContext,
    Path((pool, branch)): Path<(String, String)>,
    Json(req): Json<BranchRequest>,
) -> Result<StatusCode, LakeError> {
    let head = Commitish::new(pool, branch);
    lake.create_branch(&rc.ctx, &head, &req.base).await?;
    Ok(StatusCode::CREATED)
}

async fn load(
    State(lake): State<Arc<dyn Lake>>,
    rc: RequestContext,
    Path((pool, branch)): Path<(String, String)>,
    Query(params): Query<LoadParams>,
    body: Bytes,
) -> Result<Json<Commit>, LakeError> {
    let head = Commitish::new(pool, branch);
    let meta = CommitMeta {
        author: params.author,
        message: params.message,
        seek_stride: params.seekstride,
    };
    let commit = lake.load(&rc.ctx, &head, body.to_vec(), meta).await?;
    tracing::info!(request_id = %rc.request_id, head = %head, commit = %commit.id, "load committed");
    Ok(Json(commit))
}

async fn query(
    State(lake): State<Arc<dyn Lake>>,
    rc: RequestContext,
    Json(req): Json<QueryRequest>,
) -> Result<Vec<u8>, LakeError> {
    let head = req
        .head
        .as_deref()
        .filter(|head| !head.is_empty())
        .map(Commitish::parse)
        .transpose()
        .map_err(|e| LakeError::Invalid(e.to_string()))?;
    let mut stream = lake.query(&rc.ctx, head.as_ref(), &req.query).await?;
    let mut out = Vec::new();
    loop {
        tokio::select! {
            _ = rc.ctx.cancelled() => {
                return Err(rc.ctx.err().unwrap_or(Canceled::Canceled).into());
            }
            chunk = stream.next_chunk() => match chunk? {
                Some(chunk) => out.extend(chunk),
                None => break,
            },
        }
    }
    Ok(out)
}
