use std::sync::Arc;

use futures::StreamExt;
use shared::{
    domain::{MessageId, RoomId},
    protocol::UserNode,
};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{RoomEffect, RoomEvent, RoomScreen, RoomView};
use crate::{api::ChatApi, cache::NormalizedCache};

pub struct RoomHandle {
    room_id: RoomId,
    events: mpsc::UnboundedSender<RoomEvent>,
    views: watch::Receiver<RoomView>,
    task: JoinHandle<()>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Queues an event. Returns false once the room has shut down.
    pub fn send(&self, event: RoomEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn set_draft(&self, text: impl Into<String>) -> bool {
        self.send(RoomEvent::DraftChanged(text.into()))
    }

    pub fn submit(&self) -> bool {
        self.send(RoomEvent::SendRequested)
    }

    /// Sends `text` after any sends still in flight or queued.
    pub fn queue_message(&self, text: impl Into<String>) -> bool {
        self.send(RoomEvent::MessageQueued(text.into()))
    }

    pub fn messages_visible(&self, ids: Vec<MessageId>) -> bool {
        self.send(RoomEvent::MessagesVisible(ids))
    }

    pub fn views(&self) -> watch::Receiver<RoomView> {
        self.views.clone()
    }

    pub fn current_view(&self) -> RoomView {
        self.views.borrow().clone()
    }

    /// Unmounts the screen and waits for the loop to finish.
    pub async fn close(self) {
        let _ = self.events.send(RoomEvent::Unmounted);
        if let Err(err) = self.task.await {
            warn!(room_id = self.room_id.0, error = %err, "room: driver task failed");
        }
    }
}

pub fn spawn_room(
    api: Arc<dyn ChatApi>,
    cache: Arc<Mutex<NormalizedCache>>,
    room_id: RoomId,
    talking_to: Option<String>,
    me: Option<UserNode>,
) -> RoomHandle {
    let mut screen = RoomScreen::new(room_id, talking_to);
    if let Some(me) = me {
        screen = screen.with_profile(me);
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (views_tx, views_rx) = watch::channel(screen.view(&NormalizedCache::new()));
    let _ = events_tx.send(RoomEvent::Mounted);

    let driver = RoomDriver {
        screen,
        api,
        cache,
        events: events_tx.clone(),
        views: views_tx,
        subscription: None,
    };
    let task = tokio::spawn(driver.run(events_rx));

    RoomHandle {
        room_id,
        events: events_tx,
        views: views_rx,
        task,
    }
}

struct RoomDriver {
    screen: RoomScreen,
    api: Arc<dyn ChatApi>,
    cache: Arc<Mutex<NormalizedCache>>,
    events: mpsc::UnboundedSender<RoomEvent>,
    views: watch::Sender<RoomView>,
    subscription: Option<JoinHandle<()>>,
}

impl RoomDriver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<RoomEvent>) {
        let room_id = self.screen.room_id();
        while let Some(event) = events.recv().await {
            let unmounting = event == RoomEvent::Unmounted;
            let effects = {
                let mut cache = self.cache.lock().await;
                let effects = self.screen.handle(&mut cache, event);
                self.views.send_replace(self.screen.view(&cache));
                effects
            };

            for effect in effects {
                self.execute(effect);
            }

            if unmounting {
                break;
            }
        }

        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
        info!(room_id = room_id.0, "room: driver stopped");
    }

    fn execute(&mut self, effect: RoomEffect) {
        debug!(?effect, "room: executing effect");
        let api = Arc::clone(&self.api);
        let events = self.events.clone();

        match effect {
            RoomEffect::FetchProfile => {
                tokio::spawn(async move {
                    match api.me().await {
                        Ok(Some(me)) => {
                            let _ = events.send(RoomEvent::ProfileLoaded(me));
                        }
                        Ok(None) => warn!("room: no profile for current session"),
                        Err(err) => warn!(error = %err, "room: failed to load profile"),
                    }
                });
            }
            RoomEffect::FetchRoom { room_id } => {
                tokio::spawn(async move {
                    match api.see_room(room_id).await {
                        Ok(room) => {
                            let _ = events.send(RoomEvent::RoomLoaded(room));
                        }
                        Err(err) => warn!(room_id = room_id.0, error = %err, "room: failed to load room"),
                    }
                });
            }
            RoomEffect::Subscribe { room_id } => {
                let task = tokio::spawn(async move {
                    let mut updates = match api.room_updates(room_id).await {
                        Ok(updates) => updates,
                        Err(err) => {
                            warn!(room_id = room_id.0, error = %err, "room: failed to subscribe");
                            return;
                        }
                    };
                    while let Some(update) = updates.next().await {
                        match update {
                            Ok(message) => {
                                if events.send(RoomEvent::SubscriptionPushed(message)).is_err() {
                                    break;
                                }
                            }
                            Err(err) => warn!(room_id = room_id.0, error = %err, "room: live update failed"),
                        }
                    }
                    debug!(room_id = room_id.0, "room: live updates ended");
                });
                if let Some(previous) = self.subscription.replace(task) {
                    previous.abort();
                }
            }
            RoomEffect::SendMessage { room_id, payload } => {
                tokio::spawn(async move {
                    let result = api
                        .send_message(room_id, &payload)
                        .await
                        .map_err(|err| format!("{err:#}"));
                    let _ = events.send(RoomEvent::SendCompleted(result));
                });
            }
            RoomEffect::AcknowledgeRead { message_id } => {
                tokio::spawn(async move {
                    let result = api
                        .read_message(message_id)
                        .await
                        .map_err(|err| format!("{err:#}"));
                    let _ = events.send(RoomEvent::ReadAcknowledged { message_id, result });
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/driver_tests.rs"]
mod tests;
