//! core::head
//!
//! Reading and writing the `.zed_head` file that records the pool and
//! branch commands act on when `-use` is not given.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use super::commitish::Commitish;
use super::fs::replace_file;
use super::paths::head_path;
use super::CoreError;

/// Read the HEAD recorded in `dir`, if any.
pub fn read_head(dir: &Path) -> Result<Option<Commitish>, CoreError> {
    let path = head_path(dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(CoreError::Io { path, source }),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    Commitish::parse(&text).map(Some)
}

/// Record `head` in `dir`, replacing any previous HEAD atomically.
pub fn write_head(dir: &Path, head: &Commitish) -> Result<(), CoreError> {
    let path = head_path(dir);
    replace_file(&path, 0o644, |w: &mut dyn Write| writeln!(w, "{head}"))
        .map_err(|source| CoreError::Io { path, source })
}

/// The HEAD to act on: the `-use` flag when set, otherwise the HEAD file.
pub fn resolve_head(use_flag: &str, dir: &Path) -> Result<Option<Commitish>, CoreError> {
    if !use_flag.trim().is_empty() {
        return Commitish::parse(use_flag).map(Some);
    }
    read_head(dir)
}

/// Like [`resolve_head`] but a missing HEAD is an error.
pub fn require_head(use_flag: &str, dir: &Path) -> Result<Commitish, CoreError> {
    resolve_head(use_flag, dir)?.ok_or(CoreError::NoHead)
}
