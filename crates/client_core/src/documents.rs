//! GraphQL documents used by the chat client.

use async_graphql::parser::{parse_query, types::OperationType};
use shared::domain::OperationKind;
use tracing::debug;

pub const ROOM_FRAGMENT: &str = r#"
fragment RoomParts on Room {
  id
  unreadTotal
  lastMessage {
    id
    payload
    user {
      id
      username
      avatar
    }
  }
  users {
    id
    avatar
    username
  }
}
"#;

pub const NEW_MESSAGE_FRAGMENT: &str = r#"
fragment NewMessage on Message {
  id
  payload
  user {
    id
    username
    avatar
  }
  read
}
"#;

pub const MATCH_FRAGMENT: &str = r#"
fragment MatchParts on User {
  id
  username
  avatar
  userStatus
}
"#;

pub const LOCATION_FRAGMENT: &str = r#"
fragment LocationParts on Location {
  userId
  lat
  lon
  user {
    id
    avatar
    username
    sex
  }
}
"#;

const SEE_ROOM: &str = r#"
query seeRoom($id: Int!) {
  seeRoom(id: $id) {
    ...RoomParts
    messages {
      ...NewMessage
    }
  }
}
"#;

const ME: &str = r#"
query me {
  me {
    id
    username
    avatar
  }
}
"#;

pub const SEND_MESSAGE: &str = r#"
mutation sendMessage($payload: String!, $roomId: Int) {
  sendMessage(payload: $payload, roomId: $roomId) {
    ok
    id
    error
  }
}
"#;

pub const READ_MESSAGE: &str = r#"
mutation readMessage($id: Int!) {
  readMessage(id: $id) {
    ok
    error
  }
}
"#;

const ROOM_UPDATES: &str = r#"
subscription roomUpdates($id: Int!) {
  roomUpdates(id: $id) {
    ...NewMessage
  }
}
"#;

pub fn see_room() -> String {
    [SEE_ROOM, ROOM_FRAGMENT, NEW_MESSAGE_FRAGMENT].concat()
}

pub fn me() -> &'static str {
    ME
}

pub fn room_updates() -> String {
    [ROOM_UPDATES, NEW_MESSAGE_FRAGMENT].concat()
}

/// Kind of the first operation definition in `document`. `None` when the
/// document does not parse or holds no operation.
pub fn main_operation_kind(document: &str) -> Option<OperationKind> {
    let parsed = match parse_query(document) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(error = %err, "documents: unparseable graphql document");
            return None;
        }
    };

    let (_, operation) = parsed
        .operations
        .iter()
        .min_by_key(|(_, operation)| (operation.pos.line, operation.pos.column))?;
    Some(match operation.node.ty {
        OperationType::Query => OperationKind::Query,
        OperationType::Mutation => OperationKind::Mutation,
        OperationType::Subscription => OperationKind::Subscription,
    })
}
