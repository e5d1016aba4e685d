pub mod driver;
mod read_tracking;
mod subscription_guard;

pub use read_tracking::ReadTrackingSet;
pub use subscription_guard::{RoomPhase, SubscriptionGuard};

use std::collections::VecDeque;

use shared::{
    domain::{MessageId, RoomId},
    protocol::{MessageNode, MutationResult, RoomNode, UserNode},
};
use tracing::{debug, info, warn};

use crate::{
    cache::{EntityKey, NormalizedCache},
    reconciler::{self, ReadOutcome, RoomSnapshot, SendOutcome},
};

const FALLBACK_TITLE: &str = "Chat";

#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Mounted,
    ProfileLoaded(UserNode),
    DraftChanged(String),
    RoomLoaded(Option<RoomNode>),
    SendRequested,
    /// Text to send once earlier sends have completed.
    MessageQueued(String),
    SendCompleted(Result<MutationResult, String>),
    MessagesVisible(Vec<MessageId>),
    ReadAcknowledged {
        message_id: MessageId,
        result: Result<MutationResult, String>,
    },
    SubscriptionPushed(Option<MessageNode>),
    Unmounted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEffect {
    FetchProfile,
    FetchRoom { room_id: RoomId },
    Subscribe { room_id: RoomId },
    SendMessage { room_id: RoomId, payload: String },
    AcknowledgeRead { message_id: MessageId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub message: MessageNode,
    pub outgoing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub room_id: RoomId,
    pub title: String,
    pub phase: RoomPhase,
    pub loading: bool,
    pub unread_total: u32,
    pub messages: Vec<MessageView>,
    pub draft: String,
    pub queued: usize,
    pub can_send: bool,
}

#[derive(Debug)]
pub struct RoomScreen {
    room_id: RoomId,
    talking_to: Option<String>,
    phase: RoomPhase,
    closed: bool,
    me: Option<UserNode>,
    draft: String,
    sending: bool,
    outbox: VecDeque<String>,
    read_tracking: ReadTrackingSet,
    subscription: SubscriptionGuard,
}

impl RoomScreen {
    pub fn new(room_id: RoomId, talking_to: Option<String>) -> Self {
        Self {
            room_id,
            talking_to,
            phase: RoomPhase::Unmounted,
            closed: false,
            me: None,
            draft: String::new(),
            sending: false,
            outbox: VecDeque::new(),
            read_tracking: ReadTrackingSet::new(),
            subscription: SubscriptionGuard::new(),
        }
    }

    pub fn with_profile(mut self, me: UserNode) -> Self {
        self.me = Some(me);
        self
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    pub fn read_tracking(&self) -> &ReadTrackingSet {
        &self.read_tracking
    }

    pub fn title(&self) -> &str {
        self.talking_to.as_deref().unwrap_or(FALLBACK_TITLE)
    }

    pub fn handle(&mut self, cache: &mut NormalizedCache, event: RoomEvent) -> Vec<RoomEffect> {
        if self.closed || (self.phase == RoomPhase::Unmounted && event != RoomEvent::Mounted) {
            debug!(room_id = self.room_id.0, ?event, "room: dropping event outside mount");
            return Vec::new();
        }

        match event {
            RoomEvent::Mounted => self.on_mounted(),
            RoomEvent::ProfileLoaded(me) => {
                self.me = Some(me);
                Vec::new()
            }
            RoomEvent::DraftChanged(text) => {
                self.draft = text;
                Vec::new()
            }
            RoomEvent::RoomLoaded(room) => self.on_room_loaded(cache, room),
            RoomEvent::SendRequested => self.on_send_requested(),
            RoomEvent::MessageQueued(text) => {
                if !text.is_empty() {
                    self.outbox.push_back(text);
                }
                self.drain_outbox()
            }
            RoomEvent::SendCompleted(result) => self.on_send_completed(cache, result),
            RoomEvent::MessagesVisible(ids) => self.on_messages_visible(cache, &ids),
            RoomEvent::ReadAcknowledged { message_id, result } => {
                self.on_read_acknowledged(cache, message_id, result);
                Vec::new()
            }
            RoomEvent::SubscriptionPushed(message) => {
                self.on_pushed(cache, message);
                Vec::new()
            }
            RoomEvent::Unmounted => {
                self.phase = RoomPhase::Unmounted;
                self.closed = true;
                self.outbox.clear();
                self.read_tracking.clear();
                Vec::new()
            }
        }
    }

    fn on_mounted(&mut self) -> Vec<RoomEffect> {
        if self.phase != RoomPhase::Unmounted {
            return Vec::new();
        }
        self.phase = RoomPhase::Loading;
        let mut effects = Vec::with_capacity(2);
        if self.me.is_none() {
            effects.push(RoomEffect::FetchProfile);
        }
        effects.push(RoomEffect::FetchRoom {
            room_id: self.room_id,
        });
        effects
    }

    fn on_room_loaded(
        &mut self,
        cache: &mut NormalizedCache,
        room: Option<RoomNode>,
    ) -> Vec<RoomEffect> {
        if let Some(room) = &room {
            cache.write_room(room);
        }
        if !self.subscription.try_arm(room.is_some()) {
            return Vec::new();
        }
        self.phase = RoomPhase::Subscribed;
        info!(room_id = self.room_id.0, "room: subscribing to live updates");
        vec![RoomEffect::Subscribe {
            room_id: self.room_id,
        }]
    }

    fn on_send_requested(&mut self) -> Vec<RoomEffect> {
        if self.sending || self.draft.is_empty() {
            return Vec::new();
        }
        self.sending = true;
        vec![RoomEffect::SendMessage {
            room_id: self.room_id,
            payload: self.draft.clone(),
        }]
    }

    // A failed send keeps its text in the draft, which holds back the queue
    // until that draft is sent again.
    fn drain_outbox(&mut self) -> Vec<RoomEffect> {
        if self.sending || !self.draft.is_empty() {
            return Vec::new();
        }
        match self.outbox.pop_front() {
            Some(text) => {
                self.draft = text;
                self.on_send_requested()
            }
            None => Vec::new(),
        }
    }

    fn on_send_completed(
        &mut self,
        cache: &mut NormalizedCache,
        result: Result<MutationResult, String>,
    ) -> Vec<RoomEffect> {
        self.sending = false;
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                warn!(room_id = self.room_id.0, error = %err, "room: send failed");
                return Vec::new();
            }
        };

        match reconciler::append_on_send(
            cache,
            self.room_id,
            &result,
            self.me.as_ref(),
            &mut self.draft,
        ) {
            SendOutcome::Skipped(reason) => warn!(
                room_id = self.room_id.0,
                ?reason,
                error = result.error.as_deref().unwrap_or_default(),
                "room: sent message not applied"
            ),
            outcome => debug!(room_id = self.room_id.0, ?outcome, "room: sent message applied"),
        }
        self.drain_outbox()
    }

    fn on_messages_visible(&mut self, cache: &NormalizedCache, ids: &[MessageId]) -> Vec<RoomEffect> {
        let Some(talking_to) = self.talking_to.as_deref() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        for id in ids {
            let Some(message) = cache.read_message(&EntityKey::message(*id)) else {
                continue;
            };
            if message.read || message.user.username != talking_to {
                continue;
            }
            if self.read_tracking.try_claim(message.id) {
                effects.push(RoomEffect::AcknowledgeRead {
                    message_id: message.id,
                });
            }
        }
        effects
    }

    fn on_read_acknowledged(
        &mut self,
        cache: &mut NormalizedCache,
        message_id: MessageId,
        result: Result<MutationResult, String>,
    ) {
        match result {
            Ok(result) if result.ok => {
                let outcome = reconciler::mark_read(cache, self.room_id, message_id);
                info!(message_id = message_id.0, ?outcome, "room: message marked as read");
                if outcome == ReadOutcome::NotFound {
                    debug!(message_id = message_id.0, "room: read message not in room list");
                }
            }
            Ok(result) => warn!(
                message_id = message_id.0,
                error = result.error.as_deref().unwrap_or("Unknown error"),
                "room: failed to mark message as read"
            ),
            Err(err) => warn!(
                message_id = message_id.0,
                error = %err,
                "room: failed to mark message as read"
            ),
        }
    }

    fn on_pushed(&mut self, cache: &mut NormalizedCache, message: Option<MessageNode>) {
        let snapshot = RoomSnapshot::from_cache(cache, self.room_id);
        let before = snapshot.messages.len();
        let next = reconciler::append_on_push(self.room_id, message, snapshot);
        if next.messages.len() != before {
            next.write_to(cache);
        }
    }

    pub fn view(&self, cache: &NormalizedCache) -> RoomView {
        let room = cache.read_room(self.room_id);
        let unread_total = room.as_ref().map_or(0, |room| room.unread_total);
        let messages = room
            .map(|room| reconciler::display_order(&room.messages))
            .unwrap_or_default()
            .into_iter()
            .map(|message| MessageView {
                outgoing: self.talking_to.as_deref() != Some(message.user.username.as_str()),
                message,
            })
            .collect();

        RoomView {
            room_id: self.room_id,
            title: self.title().to_string(),
            phase: self.phase,
            loading: self.phase == RoomPhase::Loading,
            unread_total,
            messages,
            draft: self.draft.clone(),
            queued: self.outbox.len(),
            can_send: !self.draft.is_empty() && !self.sending,
        }
    }
}

#[cfg(test)]
#[path = "../tests/room_tests.rs"]
mod tests;
