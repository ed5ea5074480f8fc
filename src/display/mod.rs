//! display
//!
//! Throttled live status line for long-running commands.
//!
//! # Design
//!
//! A [`Display`] owns a background task that calls an updater at most once
//! per interval and redraws the status line it produces, erasing the
//! previous one first. Other output reaches the terminal through
//! [`Display::bypass`], which erases the status, prints the complete lines
//! and redraws the status below them, all under the same lock as the redraw
//! loop. Bypass output is therefore never overwritten.
//!
//! The loop ends when the updater returns `false`, when [`Display::close`]
//! is called, or when the context passed to [`Display::start`] is canceled.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::signalctx::SignalContext;

/// Default redraw interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Byte counters shared between readers and the status line.
#[derive(Debug, Default)]
pub struct Progress {
    read: AtomicU64,
    total: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&self, n: u64) {
        self.read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_total(&self, n: u64) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// `<read>/<total> <pct>%`, or just `<read>` while the total is unknown.
    pub fn status_line(&self) -> String {
        let read = self.read();
        let total = self.total();
        if total == 0 {
            return format_bytes(read);
        }
        let pct = (read as f64 / total as f64 * 100.0).min(100.0);
        format!("{}/{} {:.0}%", format_bytes(read), format_bytes(total), pct)
    }
}

/// Format a byte count with one decimal in the largest binary unit.
pub fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

struct Screen {
    out: Box<dyn Write + Send>,
    status: String,
    drawn: usize,
}

impl Screen {
    fn erase(&mut self) -> io::Result<()> {
        if self.drawn == 0 {
            return Ok(());
        }
        let mut seq = String::from("\r");
        if self.drawn > 1 {
            let _ = write!(seq, "\x1b[{}A", self.drawn - 1);
        }
        seq.push_str("\x1b[J");
        self.drawn = 0;
        self.out.write_all(seq.as_bytes())
    }

    fn draw(&mut self) -> io::Result<()> {
        if self.status.is_empty() {
            return self.out.flush();
        }
        self.out.write_all(self.status.as_bytes())?;
        self.drawn = self.status.lines().count().max(1);
        self.out.flush()
    }

    fn redraw(&mut self, status: &str) -> io::Result<()> {
        self.erase()?;
        self.status.clear();
        self.status.push_str(status.trim_end_matches('\n'));
        self.draw()
    }

    fn print_above(&mut self, lines: &[u8]) -> io::Result<()> {
        self.erase()?;
        self.out.write_all(lines)?;
        self.draw()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.drawn > 0 {
            self.drawn = 0;
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }
}

struct Shared {
    screen: Mutex<Screen>,
    stop: CancellationToken,
}

impl Shared {
    fn screen(&self) -> std::sync::MutexGuard<'_, Screen> {
        self.screen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live status line redrawn on a background task.
pub struct Display {
    shared: Arc<Shared>,
    done: watch::Receiver<bool>,
}

impl Display {
    /// Start redrawing the status produced by `updater` every `interval`.
    ///
    /// `updater` appends the status to the buffer it is given and returns
    /// `false` once there is nothing more to show.
    pub fn start<U>(
        ctx: &SignalContext,
        mut updater: U,
        interval: Duration,
        out: Box<dyn Write + Send>,
    ) -> Self
    where
        U: FnMut(&mut String) -> bool + Send + 'static,
    {
        let shared = Arc::new(Shared {
            screen: Mutex::new(Screen {
                out,
                status: String::new(),
                drawn: 0,
            }),
            stop: ctx.token().child_token(),
        });
        let (done_tx, done) = watch::channel(false);

        let task = Arc::clone(&shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut buf = String::new();
            loop {
                tokio::select! {
                    _ = task.stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                buf.clear();
                let more = updater(&mut buf);
                if let Err(err) = task.screen().redraw(&buf) {
                    tracing::debug!(error = %err, "status redraw failed");
                    break;
                }
                if !more {
                    break;
                }
            }
            if let Err(err) = task.screen().finish() {
                tracing::debug!(error = %err, "status finish failed");
            }
            let _ = done_tx.send(true);
        });

        Self { shared, done }
    }

    /// A writer whose complete lines are printed above the status line.
    pub fn bypass(&self) -> Bypass {
        Bypass {
            shared: Arc::clone(&self.shared),
            pending: Vec::new(),
        }
    }

    /// Stop the redraw loop. Safe to call more than once.
    pub fn close(&self) {
        self.shared.stop.cancel();
    }

    /// Wait until the redraw loop has exited.
    pub async fn done(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        self.shared.stop.cancel();
    }
}

/// Line-buffered writer that prints above a [`Display`]'s status line.
pub struct Bypass {
    shared: Arc<Shared>,
    pending: Vec<u8>,
}

impl Bypass {
    fn emit_complete(&mut self) -> io::Result<()> {
        let Some(end) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(());
        };
        let lines: Vec<u8> = self.pending.drain(..=end).collect();
        self.shared.screen().print_above(&lines)
    }
}

impl Write for Bypass {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.emit_complete()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_complete()
    }
}

impl Drop for Bypass {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.pending.push(b'\n');
            let _ = self.emit_complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn status_line_formats() {
        let progress = Progress::new();
        progress.add_read(512);
        assert_eq!(progress.status_line(), "512B");
        progress.add_total(2048);
        progress.add_read(512);
        assert_eq!(progress.status_line(), "1.0KiB/2.0KiB 50%");
    }

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1536), "1.5KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0MiB");
    }

    #[tokio::test]
    async fn updater_is_paced() {
        let interval = Duration::from_millis(20);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let started = Instant::now();
        let display = Display::start(
            &SignalContext::background(),
            move |buf: &mut String| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                buf.push_str(&format!("tick {n}"));
                true
            },
            interval,
            Box::new(Sink::default()),
        );
        tokio::time::sleep(Duration::from_millis(110)).await;
        display.close();
        display.done().await;
        let elapsed = started.elapsed();

        let bound = (elapsed.as_nanos() as f64 / interval.as_nanos() as f64).ceil() as usize + 1;
        let count = calls.load(Ordering::SeqCst);
        assert!(count >= 1);
        assert!(count <= bound, "{count} calls in {elapsed:?}");
    }

    #[tokio::test]
    async fn updater_done_ends_loop() {
        let sink = Sink::default();
        let display = Display::start(
            &SignalContext::background(),
            |buf: &mut String| {
                buf.push_str("all done");
                false
            },
            Duration::from_millis(5),
            Box::new(sink.clone()),
        );
        display.done().await;
        display.close();
        display.close();
        assert_eq!(sink.text(), "all done\n");
    }

    #[tokio::test]
    async fn context_cancel_stops_display() {
        let ctx = SignalContext::background();
        let display = Display::start(
            &ctx,
            |buf: &mut String| {
                buf.push_str("working");
                true
            },
            Duration::from_millis(5),
            Box::new(Sink::default()),
        );
        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(1), display.done())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn bypass_lines_print_above_status() {
        let sink = Sink::default();
        let display = Display::start(
            &SignalContext::background(),
            |buf: &mut String| {
                buf.push_str("status");
                true
            },
            Duration::from_millis(5),
            Box::new(sink.clone()),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut bypass = display.bypass();
        bypass.write_all(b"warning: one").unwrap();
        assert!(!sink.text().contains("warning"));
        bypass.write_all(b"\n").unwrap();
        drop(bypass);

        tokio::time::sleep(Duration::from_millis(20)).await;
        display.close();
        display.done().await;

        let text = sink.text();
        let at = text.find("warning: one\n").unwrap();
        // The status is erased in place before the warning and redrawn after.
        assert!(text[..at].ends_with("\r\x1b[J"));
        assert!(text[at..].starts_with("warning: one\nstatus"));
        // A one-line status never moves the cursor up into earlier output.
        assert!(!text.contains("A\x1b[J"));
        assert!(text.ends_with("status\n"));
    }
}
