use super::*;
use serde_json::json;

#[test]
fn request_serializes_operation_name_in_camel_case() {
    let request = GraphQlRequest::new("query seeRoom { seeRoom { id } }")
        .with_operation_name("seeRoom")
        .with_variables(RoomVariables { id: RoomId(3) })
        .expect("variables");

    let value = serde_json::to_value(&request).expect("serialize");
    assert_eq!(value["operationName"], "seeRoom");
    assert_eq!(value["variables"]["id"], 3);
}

#[test]
fn request_without_variables_omits_field() {
    let value = serde_json::to_value(GraphQlRequest::new("{ me { id } }")).expect("serialize");
    assert!(value.get("variables").is_none());
    assert!(value.get("operationName").is_none());
}

#[test]
fn room_node_drops_null_message_entries() {
    let room: RoomNode = serde_json::from_value(json!({
        "id": 7,
        "unreadTotal": 2,
        "lastMessage": null,
        "users": [],
        "messages": [
            null,
            {"id": 1, "payload": "hey", "read": false,
             "user": {"id": "u2", "username": "bo", "avatar": null},
             "__typename": "Message"}
        ],
        "__typename": "Room"
    }))
    .expect("room");

    assert_eq!(room.id, RoomId(7));
    assert_eq!(room.unread_total, 2);
    assert_eq!(room.messages.len(), 1);
    assert_eq!(room.messages[0].user.id, UserId::new("u2"));
}

#[test]
fn mutation_result_accepts_missing_id() {
    let data: ReadMessageData = serde_json::from_value(json!({
        "readMessage": {"ok": false, "error": "not found"}
    }))
    .expect("read message");
    assert!(!data.read_message.ok);
    assert_eq!(data.read_message.id, None);
    assert_eq!(data.read_message.error.as_deref(), Some("not found"));
}

#[test]
fn socket_frames_use_graphql_transport_ws_type_tags() {
    let init = serde_json::to_value(SocketClientMessage::ConnectionInit {
        payload: Some(json!({"token": "abc"})),
    })
    .expect("init");
    assert_eq!(init, json!({"type": "connection_init", "payload": {"token": "abc"}}));

    let ping = serde_json::to_value(SocketClientMessage::Ping).expect("ping");
    assert_eq!(ping, json!({"type": "ping"}));

    let ack: SocketServerMessage =
        serde_json::from_value(json!({"type": "connection_ack"})).expect("ack");
    assert_eq!(ack, SocketServerMessage::ConnectionAck { payload: None });

    let next: SocketServerMessage = serde_json::from_value(json!({
        "type": "next",
        "id": "s1",
        "payload": {"data": {"roomUpdates": null}}
    }))
    .expect("next");
    let SocketServerMessage::Next { id, payload } = next else {
        panic!("expected next frame");
    };
    assert_eq!(id, "s1");
    assert!(payload.errors.is_empty());
}

#[test]
fn api_error_maps_extension_code() {
    let err: GraphQlError = serde_json::from_value(json!({
        "message": "login required",
        "extensions": {"code": "UNAUTHENTICATED"}
    }))
    .expect("error");
    let api = crate::error::ApiError::from(&err);
    assert_eq!(api.code, crate::error::ErrorCode::Unauthenticated);
    assert_eq!(api.message, "login required");
}
