//! signalctx
//!
//! Cancellation contexts tied to process signals, and the setup/teardown
//! sequence every long-running command goes through.
//!
//! # Design
//!
//! A [`SignalContext`] wraps a [`CancellationToken`] and remembers why it was
//! canceled. [`init`] runs a list of [`Initializer`]s, then starts a listener
//! that cancels the returned context with [`Canceled::Signal`] when SIGINT or
//! SIGTERM arrives. The returned [`Cleanup`] cancels the context, waits for
//! the listener to exit and undoes the initializers in reverse order.
//!
//! Whichever cause reaches the context first is the one reported; later
//! cancellations are no-ops.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Why a context was canceled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Canceled {
    #[error("received signal {0}")]
    Signal(String),

    #[error("context canceled")]
    Canceled,
}

/// Signals the listener can watch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
}

impl Signal {
    /// SIGINT and SIGTERM.
    pub const DEFAULT: [Signal; 2] = [Signal::Interrupt, Signal::Terminate];

    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Inner {
    token: CancellationToken,
    cause: Mutex<Option<Canceled>>,
    parent: Option<SignalContext>,
}

/// A cancellable context that records its cancellation cause.
#[derive(Clone)]
pub struct SignalContext {
    inner: Arc<Inner>,
}

impl SignalContext {
    /// A context that is only canceled explicitly.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                cause: Mutex::new(None),
                parent: None,
            }),
        }
    }

    /// A context canceled along with this one, or on its own.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                token: self.inner.token.child_token(),
                cause: Mutex::new(None),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel with [`Canceled::Canceled`].
    pub fn cancel(&self) {
        self.cancel_with(Canceled::Canceled);
    }

    /// Cancel with `cause`. Returns false if the context was already canceled.
    pub fn cancel_with(&self, cause: Canceled) -> bool {
        {
            let mut slot = self
                .inner
                .cause
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() || self.inner.token.is_cancelled() {
                return false;
            }
            *slot = Some(cause);
        }
        self.inner.token.cancel();
        true
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The cancellation cause, or `None` while the context is live.
    ///
    /// A context canceled through its parent reports the parent's cause.
    pub fn err(&self) -> Option<Canceled> {
        if let Some(cause) = self
            .inner
            .cause
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Some(cause);
        }
        if !self.is_canceled() {
            return None;
        }
        Some(
            self.inner
                .parent
                .as_ref()
                .and_then(SignalContext::err)
                .unwrap_or(Canceled::Canceled),
        )
    }

    /// `Err` with the cause once canceled.
    pub fn check(&self) -> Result<(), Canceled> {
        match self.err() {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }

    /// Name of the signal that canceled this context, if any.
    pub fn caught(&self) -> Option<String> {
        match self.err() {
            Some(Canceled::Signal(name)) => Some(name),
            _ => None,
        }
    }

    /// Resolves when the context is canceled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    /// Wait for cancellation and return the cause.
    pub async fn done(&self) -> Canceled {
        self.cancelled().await;
        self.err().unwrap_or(Canceled::Canceled)
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }
}

impl fmt::Debug for SignalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalContext")
            .field("canceled", &self.is_canceled())
            .field("cause", &self.err())
            .finish()
    }
}

/// A setup step run before a command does its work.
pub trait Initializer: Send {
    fn init(&mut self) -> anyhow::Result<()>;

    fn cleanup(&mut self) {}
}

impl<F> Initializer for F
where
    F: FnMut() -> anyhow::Result<()> + Send,
{
    fn init(&mut self) -> anyhow::Result<()> {
        self()
    }
}

/// Teardown handle returned by [`init`].
#[must_use = "call Cleanup::run when the command finishes"]
pub struct Cleanup {
    ctx: SignalContext,
    initializers: Vec<Box<dyn Initializer>>,
    listener: Option<JoinHandle<()>>,
}

impl Cleanup {
    /// Cancel the context, wait for the signal listener, and undo the
    /// initializers in reverse order.
    pub async fn run(mut self) {
        self.ctx.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
        self.undo();
    }

    fn undo(&mut self) {
        while let Some(mut initializer) = self.initializers.pop() {
            initializer.cleanup();
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        self.ctx.cancel();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.undo();
    }
}

/// Run `initializers` and start a listener for SIGINT and SIGTERM.
///
/// Must be called from within a Tokio runtime.
pub fn init(initializers: Vec<Box<dyn Initializer>>) -> anyhow::Result<(SignalContext, Cleanup)> {
    init_with(&SignalContext::background(), &Signal::DEFAULT, initializers)
}

/// [`init`] with an explicit parent context and signal set.
pub fn init_with(
    parent: &SignalContext,
    signals: &[Signal],
    initializers: Vec<Box<dyn Initializer>>,
) -> anyhow::Result<(SignalContext, Cleanup)> {
    let mut done: Vec<Box<dyn Initializer>> = Vec::with_capacity(initializers.len());
    for mut initializer in initializers {
        if let Err(err) = initializer.init() {
            while let Some(mut prior) = done.pop() {
                prior.cleanup();
            }
            return Err(err);
        }
        done.push(initializer);
    }

    let ctx = parent.child();
    let listener = match listener::Listener::register(signals) {
        Ok(listener) => listener,
        Err(err) => {
            while let Some(mut prior) = done.pop() {
                prior.cleanup();
            }
            return Err(err.into());
        }
    };
    let task = tokio::spawn(listener.run(ctx.clone()));

    Ok((
        ctx.clone(),
        Cleanup {
            ctx,
            initializers: done,
            listener: Some(task),
        },
    ))
}

#[cfg(unix)]
mod listener {
    use std::io;

    use tokio::signal::unix::{signal, SignalKind};

    use super::{Canceled, Signal, SignalContext};

    pub(super) struct Listener {
        interrupt: Option<tokio::signal::unix::Signal>,
        terminate: Option<tokio::signal::unix::Signal>,
        hangup: Option<tokio::signal::unix::Signal>,
    }

    async fn recv(stream: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
        match stream {
            Some(stream) => stream.recv().await,
            None => std::future::pending().await,
        }
    }

    impl Listener {
        pub(super) fn register(signals: &[Signal]) -> io::Result<Self> {
            let watch = |which: Signal, kind: SignalKind| -> io::Result<_> {
                if signals.contains(&which) {
                    signal(kind).map(Some)
                } else {
                    Ok(None)
                }
            };
            Ok(Self {
                interrupt: watch(Signal::Interrupt, SignalKind::interrupt())?,
                terminate: watch(Signal::Terminate, SignalKind::terminate())?,
                hangup: watch(Signal::Hangup, SignalKind::hangup())?,
            })
        }

        pub(super) async fn run(mut self, ctx: SignalContext) {
            let caught = tokio::select! {
                _ = ctx.cancelled() => None,
                Some(()) = recv(&mut self.interrupt) => Some(Signal::Interrupt),
                Some(()) = recv(&mut self.terminate) => Some(Signal::Terminate),
                Some(()) = recv(&mut self.hangup) => Some(Signal::Hangup),
            };
            if let Some(signal) = caught {
                tracing::info!(signal = signal.name(), "caught signal, canceling");
                ctx.cancel_with(Canceled::Signal(signal.name().to_string()));
            }
        }
    }
}

#[cfg(not(unix))]
mod listener {
    use std::io;

    use super::{Canceled, Signal, SignalContext};

    pub(super) struct Listener {
        interrupt: bool,
    }

    impl Listener {
        pub(super) fn register(signals: &[Signal]) -> io::Result<Self> {
            Ok(Self {
                interrupt: signals.contains(&Signal::Interrupt),
            })
        }

        pub(super) async fn run(self, ctx: SignalContext) {
            if !self.interrupt {
                ctx.cancelled().await;
                return;
            }
            tokio::select! {
                _ = ctx.cancelled() => {}
                Ok(()) = tokio::signal::ctrl_c() => {
                    tracing::info!(signal = "SIGINT", "caught signal, canceling");
                    ctx.cancel_with(Canceled::Signal(Signal::Interrupt.name().to_string()));
                }
            }
        }
    }
}
