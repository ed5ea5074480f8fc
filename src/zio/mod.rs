//! zio
//!
//! Reading command inputs and writing command output.
//!
//! # Design
//!
//! Inputs are named by URI: `-` is standard input, anything else a file
//! path. [`open_inputs`] reads each one in `read_size` chunks, counting bytes
//! into a [`Progress`] and stopping as soon as the context is canceled. A
//! [`Format`] hint of `json` checks every line is a JSON value; `auto` and
//! `line` pass data through.
//!
//! With stop-on-error off, an input that cannot be read or fails the format
//! check becomes a warning and is skipped.
//!
//! Output goes to standard output or a file. [`copy`] drains a
//! [`QueryStream`] into the output and returns [`Canceled`] if the context
//! fires first. The `json` output format rewrites each line as compact JSON.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::charm::{Flag, FlagSet, FlagType};
use crate::display::Progress;
use crate::lake::{LakeError, QueryStream};
use crate::signalctx::{Canceled, Initializer, SignalContext};

/// Errors from reading inputs or writing output.
#[derive(Debug, Error)]
pub enum ZioError {
    #[error("{uri}: {source}")]
    Open { uri: String, source: io::Error },

    #[error("{uri}: line {line}: {message}")]
    Format {
        uri: String,
        line: usize,
        message: String,
    },

    #[error("{path}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("write output: {0}")]
    Write(io::Error),

    #[error(transparent)]
    Lake(#[from] LakeError),

    #[error(transparent)]
    Canceled(#[from] Canceled),
}

/// Data format hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Auto,
    Json,
    Line,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Auto => "auto",
            Format::Json => "json",
            Format::Line => "line",
        })
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Format::Auto),
            "json" | "ndjson" => Ok(Format::Json),
            "line" => Ok(Format::Line),
            other => Err(format!("unknown format {other:?} (auto, json, line)")),
        }
    }
}

impl FlagType for Format {
    const TYPE_NAME: &'static str = "format";

    fn parse(raw: &str) -> Result<Self, String> {
        raw.parse()
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

/// One input read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub uri: String,
    pub data: Vec<u8>,
}

/// Inputs that were read and the warnings for those that were skipped.
#[derive(Debug, Default)]
pub struct Opened {
    pub inputs: Vec<Input>,
    pub warnings: Vec<String>,
}

impl Opened {
    /// All input data concatenated, each input ending in a newline.
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for input in &self.inputs {
            out.extend_from_slice(&input.data);
            if !input.data.is_empty() && !input.data.ends_with(b"\n") {
                out.push(b'\n');
            }
        }
        out
    }
}

/// Read every input in `uris`.
pub async fn open_inputs(
    ctx: &SignalContext,
    uris: &[String],
    format: Format,
    read_size: usize,
    progress: Option<&Progress>,
    stop_on_error: bool,
) -> Result<Opened, ZioError> {
    if let Some(progress) = progress {
        for uri in uris.iter().filter(|uri| uri.as_str() != "-") {
            if let Ok(meta) = tokio::fs::metadata(uri).await {
                progress.add_total(meta.len());
            }
        }
    }

    let mut opened = Opened::default();
    for uri in uris {
        match read_input(ctx, uri, format, read_size, progress).await {
            Ok(data) => opened.inputs.push(Input {
                uri: uri.clone(),
                data,
            }),
            Err(ZioError::Canceled(cause)) => return Err(cause.into()),
            Err(err) if stop_on_error => return Err(err),
            Err(err) => {
                tracing::debug!(uri = %uri, error = %err, "skipping input");
                opened.warnings.push(err.to_string());
            }
        }
    }
    Ok(opened)
}

async fn read_input(
    ctx: &SignalContext,
    uri: &str,
    format: Format,
    read_size: usize,
    progress: Option<&Progress>,
) -> Result<Vec<u8>, ZioError> {
    let open_err = |source| ZioError::Open {
        uri: uri.to_string(),
        source,
    };
    let data = if uri == "-" {
        read_all(ctx, tokio::io::stdin(), read_size, progress)
            .await
            .map_err(|err| err.map_io(open_err))?
    } else {
        let file = tokio::fs::File::open(uri).await.map_err(open_err)?;
        read_all(ctx, file, read_size, progress)
            .await
            .map_err(|err| err.map_io(open_err))?
    };
    check_format(format, &data).map_err(|(line, message)| ZioError::Format {
        uri: uri.to_string(),
        line,
        message,
    })?;
    Ok(data)
}

enum ReadError {
    Io(io::Error),
    Canceled(Canceled),
}

impl ReadError {
    fn map_io(self, f: impl FnOnce(io::Error) -> ZioError) -> ZioError {
        match self {
            ReadError::Io(err) => f(err),
            ReadError::Canceled(cause) => ZioError::Canceled(cause),
        }
    }
}

async fn read_all<R>(
    ctx: &SignalContext,
    mut reader: R,
    read_size: usize,
    progress: Option<&Progress>,
) -> Result<Vec<u8>, ReadError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; read_size.max(1)];
    let mut data = Vec::new();
    loop {
        let n = tokio::select! {
            _ = ctx.cancelled() => {
                return Err(ReadError::Canceled(ctx.err().unwrap_or(Canceled::Canceled)));
            }
            n = reader.read(&mut buf) => n.map_err(ReadError::Io)?,
        };
        if n == 0 {
            return Ok(data);
        }
        if let Some(progress) = progress {
            progress.add_read(n as u64);
        }
        data.extend_from_slice(&buf[..n]);
    }
}

/// Check `data` against `format`. Returns the failing line number.
fn check_format(format: Format, data: &[u8]) -> Result<(), (usize, String)> {
    if format != Format::Json {
        return Ok(());
    }
    for (index, line) in data.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        serde_json::from_slice::<serde_json::Value>(line)
            .map_err(|err| (index + 1, err.to_string()))?;
    }
    Ok(())
}

/// Output writer.
pub type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Standard output when `path` is empty or `-`, else a new file at `path`.
pub async fn open_output(path: Option<&Path>) -> Result<Output, ZioError> {
    match path.filter(|path| !path.as_os_str().is_empty() && *path != Path::new("-")) {
        None => Ok(Box::new(tokio::io::stdout())),
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .map_err(|source| ZioError::Create {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(Box::new(file))
        }
    }
}

/// Rewrites output lines for an output [`Format`].
struct Encoder {
    format: Format,
    pending: Vec<u8>,
    line: usize,
}

impl Encoder {
    fn new(format: Format) -> Self {
        Self {
            format,
            pending: Vec::new(),
            line: 0,
        }
    }

    fn push(&mut self, chunk: Vec<u8>) -> Result<Vec<u8>, (usize, String)> {
        if self.format != Format::Json {
            return Ok(chunk);
        }
        self.pending.extend(chunk);
        let Some(end) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete: Vec<u8> = self.pending.drain(..=end).collect();
        self.encode(&complete)
    }

    fn finish(&mut self) -> Result<Vec<u8>, (usize, String)> {
        let rest = std::mem::take(&mut self.pending);
        self.encode(&rest)
    }

    fn encode(&mut self, lines: &[u8]) -> Result<Vec<u8>, (usize, String)> {
        let mut out = Vec::new();
        for line in lines.split(|b| *b == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            self.line += 1;
            let value: serde_json::Value =
                serde_json::from_slice(line).map_err(|err| (self.line, err.to_string()))?;
            serde_json::to_writer(&mut out, &value).map_err(|err| (self.line, err.to_string()))?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// Copy `stream` into `out`, stopping with [`Canceled`] when `ctx` fires.
///
/// Returns the number of bytes written.
pub async fn copy<W>(
    ctx: &SignalContext,
    stream: &mut dyn QueryStream,
    out: &mut W,
    format: Format,
) -> Result<u64, ZioError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut encoder = Encoder::new(format);
    let mut written = 0u64;
    let format_err = |(line, message)| ZioError::Format {
        uri: "output".to_string(),
        line,
        message,
    };
    loop {
        let chunk = tokio::select! {
            _ = ctx.cancelled() => return Err(ctx.err().unwrap_or(Canceled::Canceled).into()),
            chunk = stream.next_chunk() => chunk?,
        };
        let (bytes, last) = match chunk {
            Some(chunk) => (encoder.push(chunk).map_err(format_err)?, false),
            None => (encoder.finish().map_err(format_err)?, true),
        };
        if !bytes.is_empty() {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ctx.err().unwrap_or(Canceled::Canceled).into()),
                result = out.write_all(&bytes) => result.map_err(ZioError::Write)?,
            }
            written += bytes.len() as u64;
        }
        if last {
            break;
        }
    }
    out.flush().await.map_err(ZioError::Write)?;
    Ok(written)
}

/// The `-i` and `-e` flags of commands that read inputs.
#[derive(Clone)]
pub struct InputFlags {
    format: Flag<Format>,
    stop_on_error: Flag<bool>,
}

impl InputFlags {
    pub fn bind(flags: &mut FlagSet) -> Self {
        Self {
            format: flags.define("i", Format::Auto, "format of input data (auto, json, line)"),
            stop_on_error: flags.bool("e", true, "stop upon input errors"),
        }
    }

    pub fn format(&self) -> Format {
        self.format.get()
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error.get()
    }
}

/// The `-o` and `-f` flags of commands that write output.
#[derive(Clone)]
pub struct OutputFlags {
    path: Flag<String>,
    format: Flag<Format>,
}

impl OutputFlags {
    pub fn bind(flags: &mut FlagSet) -> Self {
        Self {
            path: flags.string("o", "", "write data to output file"),
            format: flags.define("f", Format::Auto, "format for output data (auto, json, line)"),
        }
    }

    /// The output file, `None` for standard output.
    pub fn path(&self) -> Option<PathBuf> {
        let path = self.path.get();
        (!path.is_empty() && path != "-").then(|| PathBuf::from(path))
    }

    pub fn format(&self) -> Format {
        self.format.get()
    }

    pub async fn open(&self) -> Result<Output, ZioError> {
        open_output(self.path().as_deref()).await
    }
}

impl Initializer for OutputFlags {
    /// Reject an output path that names a directory before any work starts.
    fn init(&mut self) -> anyhow::Result<()> {
        if let Some(path) = self.path() {
            if path.is_dir() {
                anyhow::bail!("{}: is a directory", path.display());
            }
        }
        Ok(())
    }
}
