use shared::{
    domain::{MessageId, RoomId},
    protocol::{MessageNode, MutationResult, UserNode},
};
use tracing::{debug, warn};

use crate::cache::{EntityKey, NormalizedCache, RoomFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendSkipReason {
    NotOk,
    ProfileUnknown,
    MissingId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Appended(EntityKey),
    AlreadyPresent(EntityKey),
    RoomNotCached(EntityKey),
    Skipped(SendSkipReason),
}

/// `draft` becomes the payload and is cleared once the send is accepted. An
/// entity already cached under the new id is kept as is.
pub fn append_on_send(
    cache: &mut NormalizedCache,
    room_id: RoomId,
    result: &MutationResult,
    me: Option<&UserNode>,
    draft: &mut String,
) -> SendOutcome {
    if !result.ok {
        return SendOutcome::Skipped(SendSkipReason::NotOk);
    }
    let Some(me) = me else {
        return SendOutcome::Skipped(SendSkipReason::ProfileUnknown);
    };
    let Some(message_id) = result.id else {
        warn!(room_id = room_id.0, "reconcile: send acknowledged without a message id");
        return SendOutcome::Skipped(SendSkipReason::MissingId);
    };

    let payload = std::mem::take(draft);
    let key = EntityKey::message(message_id);
    if !cache.contains(&key) {
        cache.write_message(&MessageNode {
            id: message_id,
            payload,
            user: UserNode {
                id: me.id.clone(),
                username: me.username.clone(),
                avatar: me.avatar.clone(),
                user_status: None,
            },
            read: true,
        });
    }

    let mut already_present = false;
    let appended = {
        let key = key.clone();
        let already_present = &mut already_present;
        cache.modify_room(
            room_id,
            RoomFields::new().messages(move |mut prev| {
                if prev.contains(&key) {
                    *already_present = true;
                } else {
                    prev.push(key);
                }
                prev
            }),
        )
    };

    if !appended {
        debug!(room_id = room_id.0, message_id = message_id.0, "reconcile: room not cached");
        SendOutcome::RoomNotCached(key)
    } else if already_present {
        debug!(room_id = room_id.0, message_id = message_id.0, "reconcile: sent message already cached");
        SendOutcome::AlreadyPresent(key)
    } else {
        SendOutcome::Appended(key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub id: Option<RoomId>,
    pub messages: Vec<MessageNode>,
}

impl RoomSnapshot {
    pub fn from_cache(cache: &NormalizedCache, room_id: RoomId) -> Self {
        match cache.read_room(room_id) {
            Some(room) => Self {
                id: Some(room.id),
                messages: room.messages,
            },
            None => Self::default(),
        }
    }

    /// Appends references missing from the cached list, in snapshot order.
    pub fn write_to(&self, cache: &mut NormalizedCache) -> Option<EntityKey> {
        let room_id = self.id?;
        let room_key = cache.ensure_room(room_id);
        let refs: Vec<EntityKey> = self
            .messages
            .iter()
            .map(|message| cache.write_message(message))
            .collect();
        cache.modify_room(
            room_id,
            RoomFields::new().messages(move |mut prev| {
                for key in refs {
                    if !prev.contains(&key) {
                        prev.push(key);
                    }
                }
                prev
            }),
        );
        Some(room_key)
    }
}

pub fn append_on_push(
    room_id: RoomId,
    incoming: Option<MessageNode>,
    snapshot: RoomSnapshot,
) -> RoomSnapshot {
    let Some(incoming) = incoming else {
        return snapshot;
    };
    if snapshot
        .messages
        .iter()
        .any(|message| message.id == incoming.id)
    {
        return snapshot;
    }

    let mut messages = snapshot.messages;
    messages.push(incoming);
    RoomSnapshot {
        id: snapshot.id.or(Some(room_id)),
        messages,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Marked { unread_total: u32 },
    AlreadyRead,
    NotFound,
}

pub fn mark_read(cache: &mut NormalizedCache, room_id: RoomId, message_id: MessageId) -> ReadOutcome {
    let Some(room) = cache.room(room_id) else {
        return ReadOutcome::NotFound;
    };

    let target = room.messages.iter().find_map(|key| {
        let message = cache.read_message(key)?;
        (message.id == message_id).then(|| (key.clone(), message.read))
    });

    let Some((key, read)) = target else {
        return ReadOutcome::NotFound;
    };
    if read || !cache.mark_message_read(&key) {
        return ReadOutcome::AlreadyRead;
    }

    let mut unread_total = 0;
    cache.modify_room(
        room_id,
        RoomFields::new().unread_total(|prev| {
            unread_total = prev.saturating_sub(1);
            unread_total
        }),
    );
    ReadOutcome::Marked { unread_total }
}

pub fn display_order(messages: &[MessageNode]) -> Vec<MessageNode> {
    let mut ordered = messages.to_vec();
    ordered.sort_by_key(|message| message.id);
    ordered.reverse();
    ordered
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
