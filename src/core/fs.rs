//! core::fs
//!
//! Atomic file replacement.
//!
//! The new contents are written to a uniquely named temp file in the target's
//! directory, synced, and renamed over the target. A reader sees either the
//! old file or the new one, never a partial write. On failure the temp file
//! is removed and the original is left untouched.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use uuid::Uuid;

/// Replace `path` with whatever `write` produces, creating it with `mode`.
///
/// `mode` is applied on Unix only.
pub fn replace_file<F>(path: &Path, mode: u32, write: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    replace_file_with(path, mode, write, |from, to| fs::rename(from, to))
}

/// [`replace_file`] with a caller-supplied rename step.
pub fn replace_file_with<F, R>(path: &Path, mode: u32, write: F, rename: R) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
    R: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let temp = temp_path(path)?;
    let result = write_temp(&temp, mode, write).and_then(|()| rename(&temp, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn temp_path(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: not a file path", path.display()),
        )
    })?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(dir.join(format!(
        ".{}.{}.tmp",
        name.to_string_lossy(),
        Uuid::new_v4().simple()
    )))
}

fn write_temp<F>(temp: &Path, mode: u32, write: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let file = options.open(temp)?;

    // The umask may have stripped bits from the create mode.
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(mode))?;

    let mut writer = BufWriter::new(file);
    let sink: &mut dyn Write = &mut writer;
    write(sink)?;
    let file: File = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_text(text: &'static str) -> impl FnOnce(&mut dyn Write) -> io::Result<()> {
        move |w: &mut dyn Write| w.write_all(text.as_bytes())
    }

    #[test]
    fn replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("head");
        replace_file(&path, 0o644, write_text("one")).unwrap();
        replace_file(&path, 0o644, write_text("two")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn applies_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret");
        replace_file(&path, 0o600, write_text("x")).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn failed_rename_keeps_original_and_removes_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, "original").unwrap();

        let err = replace_file_with(&path, 0o644, write_text("new"), |_, _| {
            Err(io::Error::other("injected"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "injected");
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_write_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        let err = replace_file(&path, 0o644, |_| Err(io::Error::other("boom"))).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
