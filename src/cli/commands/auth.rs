//! cli::commands::auth
//!
//! `zed auth`: manage stored credentials for lake services.
//!
//! # Design
//!
//! Credentials are kept per endpoint, the lake URI named by `-lake`.
//! - Token values are never printed or logged
//! - Token flags are redacted in help
//! - `auth store` prompts for the access token when it is not given and
//!   standard input is a terminal
//!
//! # Example
//!
//! ```bash
//! zed -lake https://lake.example.com auth store -access "$TOKEN"
//! zed -lake https://lake.example.com auth logout
//! zed auth ls
//! ```

use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;

use crate::auth::{AuthError, CredentialStore, Tokens};
use crate::charm::{CharmError, Command, Flag, Spec};
use crate::cli::root::{root_of, RootCommand};
use crate::core::config::Config;
use crate::ui::{output, prompts};

/// `zed auth`.
pub struct AuthCommand {
    root: Arc<RootCommand>,
}

impl AuthCommand {
    fn store(&self) -> Result<(Config, CredentialStore)> {
        let config = self.root.config();
        let store = CredentialStore::new(config.config_dir.as_deref())?;
        Ok((config, store))
    }
}

#[async_trait]
impl Command for AuthCommand {
    async fn run(&self, _args: Vec<String>) -> Result<()> {
        Err(CharmError::NoRun.into())
    }
}

pub fn spec() -> Spec {
    Spec::new("auth", |parent, _| {
        Ok(Arc::new(AuthCommand {
            root: root_of(parent)?,
        }) as Arc<dyn Command>)
    })
    .usage("auth <command> [options]")
    .short("manage credentials for lake services")
    .long(
        "
The auth commands store, list and remove the tokens used to reach a lake
service. Tokens are kept in credentials.json in the configuration
directory, readable only by the owner.",
    )
}

fn auth_parent(parent: Option<Arc<dyn Command>>) -> Result<Arc<AuthCommand>> {
    crate::charm::downcast::<AuthCommand>(parent)
        .ok_or_else(|| anyhow::anyhow!("command must be attached under zed auth"))
}

/// `zed auth store`.
struct StoreCommand {
    auth: Arc<AuthCommand>,
    access: Flag<String>,
    id: Flag<String>,
    refresh: Flag<String>,
}

pub fn store_spec() -> Spec {
    Spec::new("store", |parent, flags| {
        Ok(Arc::new(StoreCommand {
            auth: auth_parent(parent)?,
            access: flags.string("access", "", "access token"),
            id: flags.string("id", "", "identity token"),
            refresh: flags.string("refresh", "", "refresh token"),
        }) as Arc<dyn Command>)
    })
    .usage("auth store [-access token] [-id token] [-refresh token]")
    .short("store tokens for the current lake")
    .long(
        "
The store command saves tokens for the lake named by -lake, replacing any
tokens already stored for it. Without -access it prompts for the access
token when run from a terminal.",
    )
    .redacted_flags("access,id,refresh")
}

#[async_trait]
impl Command for StoreCommand {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        if !args.is_empty() {
            anyhow::bail!("auth store takes no arguments");
        }
        let (config, store) = self.auth.store()?;
        let mut access = self.access.get();
        if access.is_empty() {
            access = match prompts::password("Access token") {
                Ok(token) => token,
                Err(prompts::PromptError::NotInteractive) => {
                    return Err(AuthError::MissingToken("access").into())
                }
                Err(err) => return Err(err.into()),
            };
        }
        let tokens = Tokens {
            access,
            id: self.id.get(),
            refresh: self.refresh.get(),
        };

        let mut creds = store.load()?;
        creds.add(&config.lake, tokens);
        store.save(&creds).context("failed to save credentials")?;
        tracing::debug!(endpoint = %config.lake, "stored credentials");
        output::note(format!("stored credentials for {}", config.lake));
        Ok(())
    }
}

/// `zed auth logout`.
struct LogoutCommand {
    auth: Arc<AuthCommand>,
}

pub fn logout_spec() -> Spec {
    Spec::new("logout", |parent, _| {
        Ok(Arc::new(LogoutCommand {
            auth: auth_parent(parent)?,
        }) as Arc<dyn Command>)
    })
    .usage("auth logout")
    .short("remove stored tokens for the current lake")
}

#[async_trait]
impl Command for LogoutCommand {
    async fn run(&self, _args: Vec<String>) -> Result<()> {
        let (config, store) = self.auth.store()?;
        let mut creds = store.load()?;
        if !creds.remove(&config.lake) {
            return Err(AuthError::NoCredentials(config.lake).into());
        }
        store.save(&creds).context("failed to save credentials")?;
        output::note(format!("removed credentials for {}", config.lake));
        Ok(())
    }
}

/// `zed auth ls`.
struct LsCommand {
    auth: Arc<AuthCommand>,
}

pub fn ls_spec() -> Spec {
    Spec::new("ls", |parent, _| {
        Ok(Arc::new(LsCommand {
            auth: auth_parent(parent)?,
        }) as Arc<dyn Command>)
    })
    .usage("auth ls")
    .short("list endpoints with stored tokens")
}

#[async_trait]
impl Command for LsCommand {
    async fn run(&self, _args: Vec<String>) -> Result<()> {
        let (config, store) = self.auth.store()?;
        let creds = store.load()?;
        for endpoint in creds.endpoints() {
            let marker = if endpoint == config.lake { "*" } else { " " };
            output::print(format!("{marker} {endpoint}"));
        }
        Ok(())
    }
}
