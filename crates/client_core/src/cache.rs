//! Normalized entity store keyed by `(typename, id)`.

use std::{collections::HashMap, fmt};

use shared::{
    domain::{MessageId, RoomId, UserId},
    protocol::{LocationNode, MessageNode, RoomNode, UserNode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Typename {
    Room,
    Message,
    User,
    Location,
}

impl Typename {
    pub fn as_str(self) -> &'static str {
        match self {
            Typename::Room => "Room",
            Typename::Message => "Message",
            Typename::User => "User",
            Typename::Location => "Location",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Room" => Some(Typename::Room),
            "Message" => Some(Typename::Message),
            "User" => Some(Typename::User),
            "Location" => Some(Typename::Location),
            _ => None,
        }
    }
}

/// Reference handle into the store, rendered as `Typename:id`.
///
/// Key fields per type: `Room.id`, `Message.id`, `User.id`, `Location.userId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    typename: Typename,
    id: String,
}

impl EntityKey {
    pub fn room(id: RoomId) -> Self {
        Self {
            typename: Typename::Room,
            id: id.to_string(),
        }
    }

    pub fn message(id: MessageId) -> Self {
        Self {
            typename: Typename::Message,
            id: id.to_string(),
        }
    }

    pub fn user(id: &UserId) -> Self {
        Self {
            typename: Typename::User,
            id: id.to_string(),
        }
    }

    pub fn location(user_id: &UserId) -> Self {
        Self {
            typename: Typename::Location,
            id: user_id.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (typename, id) = raw.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        Some(Self {
            typename: Typename::parse(typename)?,
            id: id.to_string(),
        })
    }

    pub fn typename(&self) -> Typename {
        self.typename
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.typename.as_str(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<String>,
    pub user_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub payload: String,
    pub user: EntityKey,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: RoomId,
    pub unread_total: u32,
    pub messages: Vec<EntityKey>,
    pub last_message: Option<EntityKey>,
    pub users: Vec<EntityKey>,
}

impl RoomRecord {
    fn empty(id: RoomId) -> Self {
        Self {
            id,
            unread_total: 0,
            messages: Vec::new(),
            last_message: None,
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub user_id: UserId,
    pub lat: f64,
    pub lon: f64,
    pub user: EntityKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntity {
    Room(RoomRecord),
    Message(MessageRecord),
    User(UserRecord),
    Location(LocationRecord),
}

type Updater<'a, T> = Box<dyn FnOnce(T) -> T + 'a>;

#[derive(Default)]
pub struct RoomFields<'a> {
    messages: Option<Updater<'a, Vec<EntityKey>>>,
    unread_total: Option<Updater<'a, u32>>,
    last_message: Option<Updater<'a, Option<EntityKey>>>,
}

impl<'a> RoomFields<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(mut self, f: impl FnOnce(Vec<EntityKey>) -> Vec<EntityKey> + 'a) -> Self {
        self.messages = Some(Box::new(f));
        self
    }

    pub fn unread_total(mut self, f: impl FnOnce(u32) -> u32 + 'a) -> Self {
        self.unread_total = Some(Box::new(f));
        self
    }

    pub fn last_message(
        mut self,
        f: impl FnOnce(Option<EntityKey>) -> Option<EntityKey> + 'a,
    ) -> Self {
        self.last_message = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct NormalizedCache {
    entities: HashMap<EntityKey, CacheEntity>,
}

impl NormalizedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    pub fn entity(&self, key: &EntityKey) -> Option<&CacheEntity> {
        self.entities.get(key)
    }

    pub fn room(&self, id: RoomId) -> Option<&RoomRecord> {
        match self.entities.get(&EntityKey::room(id)) {
            Some(CacheEntity::Room(room)) => Some(room),
            _ => None,
        }
    }

    pub fn message(&self, key: &EntityKey) -> Option<&MessageRecord> {
        match self.entities.get(key) {
            Some(CacheEntity::Message(message)) => Some(message),
            _ => None,
        }
    }

    pub fn user(&self, key: &EntityKey) -> Option<&UserRecord> {
        match self.entities.get(key) {
            Some(CacheEntity::User(user)) => Some(user),
            _ => None,
        }
    }

    pub fn write_user(&mut self, user: &UserNode) -> EntityKey {
        let key = EntityKey::user(&user.id);
        let user_status = match (self.user(&key), &user.user_status) {
            (_, Some(status)) => Some(status.clone()),
            (Some(existing), None) => existing.user_status.clone(),
            (None, None) => None,
        };
        self.entities.insert(
            key.clone(),
            CacheEntity::User(UserRecord {
                id: user.id.clone(),
                username: user.username.clone(),
                avatar: user.avatar.clone(),
                user_status,
            }),
        );
        key
    }

    /// Writes a `NewMessage` fragment and its sender. `read` only moves from
    /// false to true.
    pub fn write_message(&mut self, message: &MessageNode) -> EntityKey {
        let user = self.write_user(&message.user);
        let key = EntityKey::message(message.id);
        let read = message.read || self.message(&key).is_some_and(|existing| existing.read);
        self.entities.insert(
            key.clone(),
            CacheEntity::Message(MessageRecord {
                id: message.id,
                payload: message.payload.clone(),
                user,
                read,
            }),
        );
        key
    }

    pub fn write_location(&mut self, location: &LocationNode) -> EntityKey {
        let user = self.write_user(&location.user);
        let key = EntityKey::location(&location.user_id);
        self.entities.insert(
            key.clone(),
            CacheEntity::Location(LocationRecord {
                user_id: location.user_id.clone(),
                lat: location.lat,
                lon: location.lon,
                user,
            }),
        );
        key
    }

    /// Stores a fetched room, replacing its message list wholesale.
    pub fn write_room(&mut self, room: &RoomNode) -> EntityKey {
        let messages = room
            .messages
            .iter()
            .map(|message| self.write_message(message))
            .collect();
        let users = room.users.iter().map(|user| self.write_user(user)).collect();
        let last_message = room
            .last_message
            .as_ref()
            .map(|message| self.write_message(message));

        let key = EntityKey::room(room.id);
        self.entities.insert(
            key.clone(),
            CacheEntity::Room(RoomRecord {
                id: room.id,
                unread_total: room.unread_total,
                messages,
                last_message,
                users,
            }),
        );
        key
    }

    pub fn ensure_room(&mut self, id: RoomId) -> EntityKey {
        let key = EntityKey::room(id);
        self.entities
            .entry(key.clone())
            .or_insert_with(|| CacheEntity::Room(RoomRecord::empty(id)));
        key
    }

    pub fn read_user(&self, key: &EntityKey) -> Option<UserNode> {
        let user = self.user(key)?;
        Some(UserNode {
            id: user.id.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            user_status: user.user_status.clone(),
        })
    }

    pub fn read_message(&self, key: &EntityKey) -> Option<MessageNode> {
        let message = self.message(key)?;
        let mut user = self.read_user(&message.user)?;
        user.user_status = None;
        Some(MessageNode {
            id: message.id,
            payload: message.payload.clone(),
            user,
            read: message.read,
        })
    }

    /// Denormalized room view. References that no longer resolve are skipped.
    pub fn read_room(&self, id: RoomId) -> Option<RoomNode> {
        let room = self.room(id)?;
        Some(RoomNode {
            id: room.id,
            unread_total: room.unread_total,
            last_message: room
                .last_message
                .as_ref()
                .and_then(|key| self.read_message(key)),
            users: room
                .users
                .iter()
                .filter_map(|key| self.read_user(key))
                .collect(),
            messages: room
                .messages
                .iter()
                .filter_map(|key| self.read_message(key))
                .collect(),
        })
    }

    /// Applies field updaters to a cached room. Returns false when the room is
    /// not cached, in which case nothing changes.
    pub fn modify_room(&mut self, id: RoomId, fields: RoomFields<'_>) -> bool {
        let Some(CacheEntity::Room(room)) = self.entities.get_mut(&EntityKey::room(id)) else {
            return false;
        };

        if let Some(update) = fields.messages {
            let prev = std::mem::take(&mut room.messages);
            room.messages = update(prev);
        }
        if let Some(update) = fields.unread_total {
            room.unread_total = update(room.unread_total);
        }
        if let Some(update) = fields.last_message {
            let prev = room.last_message.take();
            room.last_message = update(prev);
        }
        true
    }

    /// Flips a cached message to read. Returns true only when it was unread.
    pub fn mark_message_read(&mut self, key: &EntityKey) -> bool {
        match self.entities.get_mut(key) {
            Some(CacheEntity::Message(message)) if !message.read => {
                message.read = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
