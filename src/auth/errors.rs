//! auth::errors
//!
//! Credential error types.
//!
//! # Design
//!
//! Error messages never contain tokens. Parse failures report the serde
//! message, which names a position but not the offending value.
//!
//! # Example
//!
//! ```
//! use zedcli::auth::AuthError;
//!
//! let err = AuthError::NoCredentials("http://localhost:9867".to_string());
//! assert_eq!(err.to_string(), "no stored credentials for http://localhost:9867");
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Errors from credential operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Nothing is stored for the endpoint.
    #[error("no stored credentials for {0}")]
    NoCredentials(String),

    /// No configuration directory could be determined.
    #[error("cannot determine configuration directory: use -configdir")]
    NoConfigDir,

    /// The credentials file was written by a newer release.
    #[error("{path}: unsupported credentials version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    /// The credentials file is not valid JSON of the expected shape.
    #[error("{path}: malformed credentials file: {message}")]
    Malformed { path: PathBuf, message: String },

    /// Reading or writing the credentials file failed.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A token was required but not supplied.
    #[error("missing {0} token")]
    MissingToken(&'static str),
}
