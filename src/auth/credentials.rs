//! auth::credentials
//!
//! The credentials record: one token set per lake endpoint.
//!
//! # Schema
//!
//! ```json
//! {
//!   "version": 1,
//!   "services": [
//!     {
//!       "endpoint": "https://lake.example.com",
//!       "tokens": { "access": "...", "id": "...", "refresh": "..." }
//!     }
//!   ]
//! }
//! ```
//!
//! This module implements custom Debug to redact token values.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AuthError;

/// Current schema version.
pub const CREDENTIALS_VERSION: u32 = 1;

/// Tokens issued for one endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    #[serde(default)]
    pub access: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub refresh: String,
}

impl Tokens {
    pub fn new(access: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            ..Self::default()
        }
    }
}

/// Stored credentials for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub endpoint: String,
    pub tokens: Tokens,
}

/// The whole credentials file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub services: Vec<ServiceInfo>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            version: CREDENTIALS_VERSION,
            services: Vec::new(),
        }
    }
}

impl Credentials {
    /// Tokens for `endpoint`, if stored.
    pub fn lookup(&self, endpoint: &str) -> Option<&Tokens> {
        self.services
            .iter()
            .find(|service| service.endpoint == endpoint)
            .map(|service| &service.tokens)
    }

    /// Tokens for `endpoint`, or [`AuthError::NoCredentials`].
    pub fn require(&self, endpoint: &str) -> Result<&Tokens, AuthError> {
        self.lookup(endpoint)
            .ok_or_else(|| AuthError::NoCredentials(endpoint.to_string()))
    }

    /// Store `tokens` for `endpoint`, replacing any previous entry.
    pub fn add(&mut self, endpoint: &str, tokens: Tokens) {
        self.remove(endpoint);
        self.services.push(ServiceInfo {
            endpoint: endpoint.to_string(),
            tokens,
        });
    }

    /// Forget `endpoint`. Returns true if it was stored.
    pub fn remove(&mut self, endpoint: &str) -> bool {
        let before = self.services.len();
        self.services.retain(|service| service.endpoint != endpoint);
        self.services.len() != before
    }

    /// Stored endpoints in file order.
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|service| service.endpoint.as_str())
    }
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access", &redact(&self.access))
            .field("id", &redact(&self.id))
            .field("refresh", &redact(&self.refresh))
            .finish()
    }
}
