//! httpd
//!
//! HTTP server scaffold with graceful, deadline-bounded shutdown.
//!
//! # Lifecycle
//!
//! [`Server::start`] binds the listener and begins serving in a background
//! task. The server stops when the [`SignalContext`] passed to `start` is
//! canceled. [`Server::wait`] then gives in-flight requests up to the
//! shutdown deadline to finish; past it the serve task is aborted and
//! [`ServeError::DeadlineExceeded`] is returned.
//!
//! Every request carries a [`RequestContext`]: a child of the server context
//! that is canceled when the server shuts down or when the request future is
//! dropped because the client went away.

use std::convert::Infallible;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::fs::replace_file;
use crate::signalctx::SignalContext;

/// Shutdown deadline used unless overridden.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors from serving.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("listen {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("server: {0}")]
    Io(#[from] io::Error),

    #[error("server shutdown: deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("server has not been started")]
    NotStarted,

    #[error("server task failed: {0}")]
    Task(String),

    #[error("{path}: {source}")]
    PortFile {
        path: std::path::PathBuf,
        source: io::Error,
    },
}

/// Per-request context placed in request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ctx: SignalContext,
    pub request_id: String,
}

impl RequestContext {
    /// A context for requests that did not pass through [`Server`].
    pub fn detached() -> Self {
        Self {
            ctx: SignalContext::background(),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(RequestContext::detached))
    }
}

/// Cancels the request context when the request future goes away.
struct CancelOnDrop(SignalContext);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn request_context(
    State(server): State<SignalContext>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = server.child();
    let _guard = CancelOnDrop(ctx.clone());
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestContext {
        ctx,
        request_id: request_id.clone(),
    });

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

struct Running {
    ctx: SignalContext,
    local_addr: SocketAddr,
    task: JoinHandle<io::Result<()>>,
}

/// An HTTP server bound to one address.
pub struct Server {
    addr: String,
    router: Option<Router>,
    shutdown_timeout: Duration,
    running: Option<Running>,
}

impl Server {
    /// A server that will serve `router` on `addr` (`host:port`, `:port`).
    pub fn new(addr: impl Into<String>, router: Router) -> Self {
        Self {
            addr: addr.into(),
            router: Some(router),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            running: None,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Bind and begin serving. Returns the bound address.
    pub async fn start(&mut self, ctx: &SignalContext) -> Result<SocketAddr, ServeError> {
        let router = self.router.take().ok_or(ServeError::NotStarted)?;
        let addr = normalize_addr(&self.addr);
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| ServeError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let app = router
            .layer(middleware::from_fn_with_state(ctx.clone(), request_context))
            .layer(TraceLayer::new_for_http());
        let token = ctx.token();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        });

        tracing::info!(addr = %local_addr, "listening");
        self.running = Some(Running {
            ctx: ctx.clone(),
            local_addr,
            task,
        });
        Ok(local_addr)
    }

    /// The bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Write the bound port, in decimal, to `path`.
    pub fn write_port_file(&self, path: &Path) -> Result<(), ServeError> {
        let addr = self.local_addr().ok_or(ServeError::NotStarted)?;
        replace_file(path, 0o644, |w: &mut dyn Write| write!(w, "{}", addr.port())).map_err(
            |source| ServeError::PortFile {
                path: path.to_path_buf(),
                source,
            },
        )
    }

    /// Wait for the server to stop.
    ///
    /// Returns when the serve task ends on its own, or when the context is
    /// canceled and in-flight requests drain within the deadline.
    pub async fn wait(&mut self) -> Result<(), ServeError> {
        let mut running = self.running.take().ok_or(ServeError::NotStarted)?;
        tokio::select! {
            result = &mut running.task => return flatten(result),
            _ = running.ctx.cancelled() => {}
        }

        tracing::info!(
            timeout = ?self.shutdown_timeout,
            cause = ?running.ctx.err(),
            "shutting down"
        );
        match tokio::time::timeout(self.shutdown_timeout, &mut running.task).await {
            Ok(result) => {
                tracing::info!("server stopped");
                flatten(result)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.shutdown_timeout, "shutdown deadline exceeded, closing");
                running.task.abort();
                Err(ServeError::DeadlineExceeded(self.shutdown_timeout))
            }
        }
    }
}

fn flatten(result: Result<io::Result<()>, tokio::task::JoinError>) -> Result<(), ServeError> {
    match result {
        Ok(result) => result.map_err(ServeError::from),
        Err(err) => Err(ServeError::Task(err.to_string())),
    }
}

/// `:port` means every interface.
fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    #[test]
    fn bare_port_binds_all_interfaces() {
        assert_eq!(normalize_addr(":9867"), "0.0.0.0:9867");
        assert_eq!(normalize_addr("localhost:9867"), "localhost:9867");
    }

    #[tokio::test]
    async fn detached_request_context_outside_server() {
        async fn handler(rc: RequestContext) -> String {
            format!("canceled={}", rc.ctx.is_canceled())
        }
        let app = Router::new().route("/", get(handler));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"canceled=false");
    }

    #[tokio::test]
    async fn middleware_sets_request_id() {
        let ctx = SignalContext::background();
        let app = Router::new()
            .route("/", get(|rc: RequestContext| async move { rc.request_id }))
            .layer(middleware::from_fn_with_state(ctx, request_context));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc");

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn wait_before_start_fails() {
        let mut server = Server::new("127.0.0.1:0", Router::new());
        assert!(matches!(server.wait().await, Err(ServeError::NotStarted)));
        assert!(server.local_addr().is_none());
    }
}
