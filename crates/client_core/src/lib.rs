use std::sync::Arc;

use anyhow::{bail, Context, Result};
use shared::{domain::RoomId, protocol::UserNode};
use storage::{KeyValueStore, Storage};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

pub mod api;
pub mod cache;
pub mod config;
pub mod documents;
pub mod reconciler;
pub mod room;
pub mod session;
pub mod transport;

pub use api::{ChatApi, GraphQlChatApi};
pub use cache::NormalizedCache;
pub use config::{load_settings, ClientSettings};
pub use room::{
    driver::{spawn_room, RoomHandle},
    RoomEffect, RoomEvent, RoomScreen, RoomView,
};
pub use session::{SessionContext, SessionHandle, SessionManager};
pub use transport::{SplitLink, TransportError};

pub struct ChatClient {
    api: Arc<dyn ChatApi>,
    sessions: SessionManager,
    cache: Arc<Mutex<NormalizedCache>>,
    me: RwLock<Option<UserNode>>,
}

impl ChatClient {
    pub async fn connect(settings: &ClientSettings) -> Result<Self> {
        let storage = Storage::new(&settings.database_url)
            .await
            .with_context(|| format!("failed to open storage at {}", settings.database_url))?;
        let store: Arc<dyn KeyValueStore> = Arc::new(storage);
        let sessions = SessionManager::new(store);
        let restored = sessions.restore().await?;

        let http_url = settings.http_endpoint()?;
        let ws_url = settings.socket_endpoint()?;
        info!(http = %http_url, ws = %ws_url, restored, "client: connected");

        let link = SplitLink::from_endpoints(http_url, ws_url, sessions.handle());
        let api: Arc<dyn ChatApi> = Arc::new(GraphQlChatApi::new(Arc::new(link)));
        Ok(Self::with_parts(api, sessions))
    }

    pub fn with_parts(api: Arc<dyn ChatApi>, sessions: SessionManager) -> Self {
        Self {
            api,
            sessions,
            cache: Arc::new(Mutex::new(NormalizedCache::new())),
            me: RwLock::new(None),
        }
    }

    pub fn session(&self) -> SessionHandle {
        self.sessions.handle()
    }

    pub fn cache(&self) -> Arc<Mutex<NormalizedCache>> {
        Arc::clone(&self.cache)
    }

    pub async fn log_in(&self, token: &str) -> Result<()> {
        self.sessions.log_user_in(token).await?;
        *self.me.write().await = None;
        Ok(())
    }

    /// Forgets the stored token and drops everything cached for the old user.
    pub async fn log_out(&self) -> Result<()> {
        self.sessions.log_user_out().await?;
        *self.me.write().await = None;
        *self.cache.lock().await = NormalizedCache::new();
        Ok(())
    }

    /// The current user's profile, fetched once per login.
    pub async fn me(&self) -> Result<Option<UserNode>> {
        if let Some(me) = self.me.read().await.clone() {
            return Ok(Some(me));
        }

        let me = self.api.me().await?;
        if let Some(profile) = &me {
            self.cache.lock().await.write_user(profile);
            *self.me.write().await = Some(profile.clone());
        }
        Ok(me)
    }

    pub async fn open_room(&self, room_id: RoomId, talking_to: Option<String>) -> Result<RoomHandle> {
        if !self.sessions.handle().is_logged_in().await {
            bail!("log in before opening room {room_id}");
        }
        let me = self.me.read().await.clone();
        Ok(spawn_room(
            Arc::clone(&self.api),
            self.cache(),
            room_id,
            talking_to,
            me,
        ))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
