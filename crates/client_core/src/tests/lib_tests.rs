use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use shared::{
    domain::{MessageId, UserId},
    protocol::{MutationResult, RoomNode},
};
use storage::MemoryStore;

use crate::{api::RoomUpdateStream, cache::EntityKey, room::RoomPhase, session::TOKEN_KEY};

#[derive(Default)]
struct CountingApi {
    me_calls: AtomicUsize,
}

fn profile() -> UserNode {
    UserNode {
        id: UserId::new("u1"),
        username: "a".to_string(),
        avatar: None,
        user_status: Some("online".to_string()),
    }
}

#[async_trait]
impl ChatApi for CountingApi {
    async fn me(&self) -> Result<Option<UserNode>> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(profile()))
    }

    async fn see_room(&self, room_id: RoomId) -> Result<Option<RoomNode>> {
        Ok(Some(RoomNode {
            id: room_id,
            unread_total: 0,
            last_message: None,
            users: vec![profile()],
            messages: Vec::new(),
        }))
    }

    async fn send_message(&self, _room_id: RoomId, _payload: &str) -> Result<MutationResult> {
        Ok(MutationResult::success(MessageId(1)))
    }

    async fn read_message(&self, message_id: MessageId) -> Result<MutationResult> {
        Ok(MutationResult::success(message_id))
    }

    async fn room_updates(&self, _room_id: RoomId) -> Result<RoomUpdateStream> {
        Ok(stream::pending().boxed())
    }
}

fn client() -> (ChatClient, Arc<CountingApi>, Arc<MemoryStore>) {
    let api = Arc::new(CountingApi::default());
    let store = Arc::new(MemoryStore::new());
    let client = ChatClient::with_parts(api.clone(), SessionManager::new(store.clone()));
    (client, api, store)
}

#[tokio::test]
async fn open_room_requires_login() {
    let (client, _, _) = client();
    let err = client.open_room(RoomId(3), None).await.err().unwrap();
    assert!(err.to_string().contains("log in"));
}

#[tokio::test]
async fn log_in_persists_token_and_allows_rooms() {
    let (client, _, store) = client();
    client.log_in("secret").await.unwrap();

    assert_eq!(
        store.get_item(TOKEN_KEY).await.unwrap().as_deref(),
        Some("secret")
    );
    assert_eq!(client.session().token().await, "secret");

    let room = client.open_room(RoomId(3), Some("bo".to_string())).await.unwrap();
    let mut views = room.views();
    views
        .wait_for(|view| view.phase == RoomPhase::Subscribed)
        .await
        .unwrap();
    assert!(client.cache().lock().await.room(RoomId(3)).is_some());
    room.close().await;
}

#[tokio::test]
async fn profile_is_fetched_once_and_cached() {
    let (client, api, _) = client();
    client.log_in("secret").await.unwrap();

    assert_eq!(client.me().await.unwrap(), Some(profile()));
    assert_eq!(client.me().await.unwrap(), Some(profile()));
    assert_eq!(api.me_calls.load(Ordering::SeqCst), 1);
    assert!(client
        .cache()
        .lock()
        .await
        .contains(&EntityKey::user(&UserId::new("u1"))));
}

#[tokio::test]
async fn log_out_clears_session_profile_and_cache() {
    let (client, api, store) = client();
    client.log_in("secret").await.unwrap();
    client.me().await.unwrap();

    client.log_out().await.unwrap();

    assert!(!client.session().is_logged_in().await);
    assert_eq!(client.session().token().await, "");
    assert_eq!(store.get_item(TOKEN_KEY).await.unwrap(), None);
    assert!(client.cache().lock().await.is_empty());

    client.log_in("other").await.unwrap();
    client.me().await.unwrap();
    assert_eq!(api.me_calls.load(Ordering::SeqCst), 2);
}
