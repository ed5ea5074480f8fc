//! lake::remote
//!
//! [`Lake`] over HTTP, speaking the routes in [`super::service`].

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};

use super::service::{BranchRequest, ErrorBody, PoolRequest, QueryRequest};
use super::{Commit, CommitMeta, Lake, LakeError, PoolInfo, QueryStream};
use crate::core::commitish::Commitish;
use crate::signalctx::{Canceled, SignalContext};

/// Client for a lake service.
#[derive(Debug, Clone)]
pub struct RemoteLake {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl RemoteLake {
    /// Client for the service at `endpoint`, sending `token` as a bearer
    /// token when given.
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, LakeError> {
        let base =
            Url::parse(endpoint).map_err(|e| LakeError::Invalid(format!("{endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(LakeError::Invalid(format!("{endpoint}: not a service URL")));
        }
        let client = Client::builder()
            .user_agent(concat!("zed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url, LakeError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LakeError::Invalid(format!("{}: not a service URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, LakeError> {
        let builder = self.client.request(method, self.url(segments)?);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(&self, ctx: &SignalContext, builder: RequestBuilder) -> Result<Response, LakeError> {
        let response = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ctx.err().unwrap_or(Canceled::Canceled).into()),
            response = builder.send() => response?,
        };
        Ok(response)
    }

    async fn send_ok(&self, ctx: &SignalContext, builder: RequestBuilder) -> Result<Response, LakeError> {
        let response = self.send(ctx, builder).await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, LakeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|body| body.error)
        .unwrap_or_else(|_| body.trim().to_string());
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        message
    };
    Err(LakeError::Status {
        status: status.as_u16(),
        message,
    })
}

struct ResponseStream(Response);

#[async_trait]
impl QueryStream for ResponseStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LakeError> {
        Ok(self.0.chunk().await?.map(|bytes| bytes.to_vec()))
    }
}

#[async_trait]
impl Lake for RemoteLake {
    async fn create_pool(&self, ctx: &SignalContext, name: &str) -> Result<PoolInfo, LakeError> {
        let request = self.request(Method::POST, &["pool"])?.json(&PoolRequest {
            name: name.to_string(),
        });
        Ok(self.send_ok(ctx, request).await?.json().await?)
    }

    async fn list_pools(&self, ctx: &SignalContext) -> Result<Vec<PoolInfo>, LakeError> {
        let request = self.request(Method::GET, &["pool"])?;
        Ok(self.send_ok(ctx, request).await?.json().await?)
    }

    async fn branch_exists(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
    ) -> Result<bool, LakeError> {
        let request =
            self.request(Method::GET, &["pool", head.pool(), "branch", head.branch()])?;
        let response = self.send(ctx, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }

    async fn create_branch(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
        base: &str,
    ) -> Result<(), LakeError> {
        let request = self
            .request(Method::POST, &["pool", head.pool(), "branch", head.branch()])?
            .json(&BranchRequest {
                base: base.to_string(),
            });
        self.send_ok(ctx, request).await?;
        Ok(())
    }

    async fn load(
        &self,
        ctx: &SignalContext,
        head: &Commitish,
        data: Vec<u8>,
        meta: CommitMeta,
    ) -> Result<Commit, LakeError> {
        let request = self
            .request(
                Method::POST,
                &["pool", head.pool(), "branch", head.branch(), "load"],
            )?
            .query(&[
                ("author", meta.author.as_str()),
                ("message", meta.message.as_str()),
                ("seekstride", meta.seek_stride.to_string().as_str()),
            ])
            .body(data);
        Ok(self.send_ok(ctx, request).await?.json().await?)
    }

    async fn query(
        &self,
        ctx: &SignalContext,
        head: Option<&Commitish>,
        query: &str,
    ) -> Result<Box<dyn QueryStream>, LakeError> {
        let request = self.request(Method::POST, &["query"])?.json(&QueryRequest {
            query: query.to_string(),
            head: head.map(ToString::to_string),
        });
        let response = self.send_ok(ctx, request).await?;
        Ok(Box::new(ResponseStream(response)))
    }
}
