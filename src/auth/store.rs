//! auth::store
//!
//! File-backed credential storage.
//!
//! # Security
//!
//! - The file is created with mode 0600 on Unix (owner read/write only)
//! - Its directory is created if missing
//! - All writes are atomic (write to temp file, then rename)
//! - Tokens are never logged, printed, or included in error messages

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::credentials::{Credentials, CREDENTIALS_VERSION};
use super::AuthError;
use crate::core::fs::replace_file_with;
use crate::core::paths::ZedPaths;

/// Loads and saves the credentials file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store in the configuration directory, `explicit` when given.
    pub fn new(explicit: Option<&Path>) -> Result<Self, AuthError> {
        let paths = ZedPaths::resolve(explicit).map_err(|_| AuthError::NoConfigDir)?;
        Ok(Self::with_path(paths.credentials_path()))
    }

    /// Store at a specific file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the credentials file. A missing file is an empty record.
    pub fn load(&self) -> Result<Credentials, AuthError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Credentials::default())
            }
            Err(source) => {
                return Err(AuthError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let creds: Credentials =
            serde_json::from_slice(&contents).map_err(|e| AuthError::Malformed {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        if creds.version > CREDENTIALS_VERSION {
            return Err(AuthError::UnsupportedVersion {
                path: self.path.clone(),
                version: creds.version,
            });
        }
        tracing::debug!(path = %self.path.display(), services = creds.services.len(), "loaded credentials");
        Ok(creds)
    }

    /// Write `creds` atomically with owner-only permissions.
    pub fn save(&self, creds: &Credentials) -> Result<(), AuthError> {
        self.save_with(creds, |from, to| fs::rename(from, to))
    }

    /// [`save`](Self::save) with a caller-supplied final rename.
    pub fn save_with<R>(&self, creds: &Credentials, rename: R) -> Result<(), AuthError>
    where
        R: FnOnce(&Path, &Path) -> io::Result<()>,
    {
        let io_err = |source| AuthError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let mut record = creds.clone();
        record.version = CREDENTIALS_VERSION;
        replace_file_with(
            &self.path,
            0o600,
            |w: &mut dyn Write| {
                serde_json::to_writer_pretty(&mut *w, &record).map_err(io::Error::other)?;
                w.write_all(b"\n")
            },
            rename,
        )
        .map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::Tokens;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CredentialStore {
        CredentialStore::with_path(dir.path().join("conf").join("credentials.json"))
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let creds = store_in(&dir).load().unwrap();
        assert_eq!(creds, Credentials::default());
    }

    #[test]
    fn save_creates_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut creds = Credentials::default();
        creds.add("http://lake", Tokens::new("T1"));
        store.save(&creds).unwrap();

        assert_eq!(store.load().unwrap(), creds);
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["services"][0]["tokens"]["access"], "T1");
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&Credentials::default()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn newer_version_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"version":2,"services":[]}"#).unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("unsupported credentials version 2"));
    }

    #[test]
    fn version_zero_accepted() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"services":[]}"#).unwrap();
        assert!(store.load().unwrap().services.is_empty());
    }

    #[test]
    fn malformed_file_does_not_echo_contents() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{\"services\": [secret-token").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, AuthError::Malformed { .. }));
        assert!(!err.to_string().contains("secret-token"));
    }

    #[test]
    fn interrupted_save_leaves_previous_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut creds = Credentials::default();
        creds.add("http://lake", Tokens::new("old"));
        store.save(&creds).unwrap();
        let before = fs::read(store.path()).unwrap();

        creds.add("http://lake", Tokens::new("new"));
        let err = store
            .save_with(&creds, |_, _| Err(io::Error::other("power loss")))
            .unwrap_err();
        assert!(err.to_string().contains("power loss"));
        assert_eq!(fs::read(store.path()).unwrap(), before);
        let entries = fs::read_dir(store.path().parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
