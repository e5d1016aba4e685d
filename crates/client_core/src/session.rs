//! Login session: the logged-in flag and bearer token shared with the
//! transport, persisted under a fixed storage key.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use storage::KeyValueStore;
use tokio::sync::RwLock;
use tracing::info;

pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub logged_in: bool,
    pub token: Option<String>,
}

impl SessionContext {
    /// Token value sent with every request; empty when there is none.
    pub fn auth_token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }
}

/// Shared read handle given to the transport at construction.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<SessionContext>>,
}

impl SessionHandle {
    pub fn new(context: SessionContext) -> Self {
        Self {
            inner: Arc::new(RwLock::new(context)),
        }
    }

    pub async fn snapshot(&self) -> SessionContext {
        self.inner.read().await.clone()
    }

    pub async fn token(&self) -> String {
        self.inner.read().await.auth_token().to_string()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.inner.read().await.logged_in
    }

    async fn replace(&self, context: SessionContext) {
        *self.inner.write().await = context;
    }
}

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    handle: SessionHandle,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            handle: SessionHandle::default(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Loads a previously stored token. Returns whether a session was found.
    pub async fn restore(&self) -> Result<bool> {
        let token = self
            .store
            .get_item(TOKEN_KEY)
            .await
            .context("failed to read stored session token")?
            .filter(|token| !token.is_empty());

        let logged_in = token.is_some();
        self.handle
            .replace(SessionContext { logged_in, token })
            .await;
        if logged_in {
            info!("session: restored stored login");
        }
        Ok(logged_in)
    }

    pub async fn log_user_in(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            bail!("cannot log in with an empty token");
        }
        self.store
            .set_item(TOKEN_KEY, token)
            .await
            .context("failed to persist session token")?;
        self.handle
            .replace(SessionContext {
                logged_in: true,
                token: Some(token.to_string()),
            })
            .await;
        info!("session: logged in");
        Ok(())
    }

    pub async fn log_user_out(&self) -> Result<()> {
        self.store
            .remove_item(TOKEN_KEY)
            .await
            .context("failed to remove stored session token")?;
        self.handle
            .replace(SessionContext {
                logged_in: false,
                token: Some(String::new()),
            })
            .await;
        info!("session: logged out");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
