//! auth - stored lake credentials
//!
//! Tokens for each lake endpoint live in `credentials.json` under the
//! configuration directory. `zed auth store` adds them, `zed auth logout`
//! removes them, and the remote lake client sends the access token as a
//! bearer token.
//!
//! # Security
//!
//! Tokens never appear in logs, error messages, help output (the token
//! flags are redacted) or debug output.
//!
//! # Example
//!
//! ```no_run
//! use zedcli::auth::{CredentialStore, Tokens};
//!
//! let store = CredentialStore::new(None)?;
//! let mut creds = store.load()?;
//! creds.add("http://localhost:9867", Tokens::new("access-token"));
//! store.save(&creds)?;
//! # Ok::<(), zedcli::auth::AuthError>(())
//! ```

mod credentials;
mod errors;
mod store;

pub use credentials::{Credentials, ServiceInfo, Tokens, CREDENTIALS_VERSION};
pub use errors::AuthError;
pub use store::CredentialStore;
