use super::*;
use shared::domain::UserId;

const ROOM: RoomId = RoomId(1);

fn me() -> UserNode {
    UserNode {
        id: UserId::new("u1"),
        username: "a".to_string(),
        avatar: None,
        user_status: None,
    }
}

fn peer() -> UserNode {
    UserNode {
        id: UserId::new("u2"),
        username: "bo".to_string(),
        avatar: Some("https://cdn.example/bo.png".to_string()),
        user_status: None,
    }
}

fn message(id: i64, sender: UserNode, read: bool) -> MessageNode {
    MessageNode {
        id: MessageId(id),
        payload: format!("message {id}"),
        user: sender,
        read,
    }
}

fn room(messages: Vec<MessageNode>, unread_total: u32) -> RoomNode {
    RoomNode {
        id: ROOM,
        unread_total,
        last_message: messages.last().cloned(),
        users: vec![me(), peer()],
        messages,
    }
}

fn mounted_screen(cache: &mut NormalizedCache) -> RoomScreen {
    let mut screen = RoomScreen::new(ROOM, Some("bo".to_string())).with_profile(me());
    screen.handle(cache, RoomEvent::Mounted);
    screen
}

#[test]
fn mount_requests_profile_and_room() {
    let mut cache = NormalizedCache::new();
    let mut screen = RoomScreen::new(ROOM, None);

    let effects = screen.handle(&mut cache, RoomEvent::Mounted);

    assert_eq!(
        effects,
        vec![RoomEffect::FetchProfile, RoomEffect::FetchRoom { room_id: ROOM }]
    );
    assert_eq!(screen.phase(), RoomPhase::Loading);
    assert_eq!(screen.title(), "Chat");
}

#[test]
fn events_before_mount_are_ignored() {
    let mut cache = NormalizedCache::new();
    let mut screen = RoomScreen::new(ROOM, None);
    let effects = screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(Vec::new(), 0))));
    assert!(effects.is_empty());
    assert!(cache.is_empty());
}

#[test]
fn subscribes_once_across_repeated_room_loads() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);

    assert!(screen
        .handle(&mut cache, RoomEvent::RoomLoaded(None))
        .is_empty());
    assert_eq!(screen.phase(), RoomPhase::Loading);

    let first = screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(Vec::new(), 0))));
    assert_eq!(first, vec![RoomEffect::Subscribe { room_id: ROOM }]);
    assert_eq!(screen.phase(), RoomPhase::Subscribed);

    let second = screen.handle(
        &mut cache,
        RoomEvent::RoomLoaded(Some(room(vec![message(1, peer(), true)], 0))),
    );
    assert!(second.is_empty());
    assert_eq!(screen.phase(), RoomPhase::Subscribed);
}

#[test]
fn send_requires_draft_and_no_send_in_flight() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);

    assert!(screen.handle(&mut cache, RoomEvent::SendRequested).is_empty());

    screen.handle(&mut cache, RoomEvent::DraftChanged("hi".to_string()));
    let effects = screen.handle(&mut cache, RoomEvent::SendRequested);
    assert_eq!(
        effects,
        vec![RoomEffect::SendMessage {
            room_id: ROOM,
            payload: "hi".to_string()
        }]
    );
    assert!(screen.is_sending());
    assert!(screen.handle(&mut cache, RoomEvent::SendRequested).is_empty());
    assert!(!screen.view(&cache).can_send);
}

#[test]
fn completed_send_appends_and_clears_draft() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(Vec::new(), 0))));
    screen.handle(&mut cache, RoomEvent::DraftChanged("hi".to_string()));
    screen.handle(&mut cache, RoomEvent::SendRequested);

    screen.handle(
        &mut cache,
        RoomEvent::SendCompleted(Ok(MutationResult::success(MessageId(10)))),
    );

    assert!(!screen.is_sending());
    assert_eq!(screen.draft(), "");
    let view = screen.view(&cache);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].message.payload, "hi");
    assert!(view.messages[0].outgoing);
}

#[test]
fn failed_send_keeps_draft_for_retry() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(Vec::new(), 0))));
    screen.handle(&mut cache, RoomEvent::DraftChanged("hi".to_string()));
    screen.handle(&mut cache, RoomEvent::SendRequested);

    screen.handle(
        &mut cache,
        RoomEvent::SendCompleted(Err("connection refused".to_string())),
    );

    assert!(!screen.is_sending());
    assert_eq!(screen.draft(), "hi");
    assert!(screen.view(&cache).messages.is_empty());
    assert!(screen.view(&cache).can_send);
}

#[test]
fn visible_unread_peer_messages_are_acknowledged_once() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(
        &mut cache,
        RoomEvent::RoomLoaded(Some(room(
            vec![
                message(1, peer(), true),
                message(2, peer(), false),
                message(3, me(), false),
            ],
            1,
        ))),
    );

    let ids = vec![MessageId(1), MessageId(2), MessageId(3), MessageId(99)];
    let first = screen.handle(&mut cache, RoomEvent::MessagesVisible(ids.clone()));
    assert_eq!(
        first,
        vec![RoomEffect::AcknowledgeRead {
            message_id: MessageId(2)
        }]
    );

    // Fast scrolling re-reports the same rows before the ack lands.
    let second = screen.handle(&mut cache, RoomEvent::MessagesVisible(ids));
    assert!(second.is_empty());
}

#[test]
fn failed_ack_is_not_retried_in_the_same_session() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(
        &mut cache,
        RoomEvent::RoomLoaded(Some(room(vec![message(2, peer(), false)], 1))),
    );
    screen.handle(&mut cache, RoomEvent::MessagesVisible(vec![MessageId(2)]));

    screen.handle(
        &mut cache,
        RoomEvent::ReadAcknowledged {
            message_id: MessageId(2),
            result: Ok(MutationResult::failure("not allowed")),
        },
    );

    assert_eq!(screen.view(&cache).unread_total, 1);
    assert!(screen
        .handle(&mut cache, RoomEvent::MessagesVisible(vec![MessageId(2)]))
        .is_empty());
}

#[test]
fn successful_ack_marks_read_and_decrements_unread() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(
        &mut cache,
        RoomEvent::RoomLoaded(Some(room(
            vec![message(1, peer(), true), message(2, peer(), false)],
            1,
        ))),
    );

    let ack = RoomEvent::ReadAcknowledged {
        message_id: MessageId(2),
        result: Ok(MutationResult::success(MessageId(2))),
    };
    screen.handle(&mut cache, ack.clone());
    screen.handle(&mut cache, ack);

    let view = screen.view(&cache);
    assert_eq!(view.unread_total, 0);
    assert!(view.messages.iter().all(|row| row.message.read));
}

#[test]
fn pushes_are_deduplicated_against_sent_messages() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(Vec::new(), 0))));
    screen.handle(&mut cache, RoomEvent::DraftChanged("hi".to_string()));
    screen.handle(&mut cache, RoomEvent::SendRequested);
    screen.handle(
        &mut cache,
        RoomEvent::SendCompleted(Ok(MutationResult::success(MessageId(10)))),
    );

    let echoed = MessageNode {
        id: MessageId(10),
        payload: "hi".to_string(),
        user: me(),
        read: true,
    };
    screen.handle(&mut cache, RoomEvent::SubscriptionPushed(Some(echoed)));
    screen.handle(
        &mut cache,
        RoomEvent::SubscriptionPushed(Some(message(11, peer(), false))),
    );
    screen.handle(&mut cache, RoomEvent::SubscriptionPushed(None));

    let ids: Vec<i64> = screen
        .view(&cache)
        .messages
        .iter()
        .map(|row| row.message.id.0)
        .collect();
    assert_eq!(ids, vec![11, 10]);
}

#[test]
fn view_orders_newest_first_and_flags_outgoing() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(
        &mut cache,
        RoomEvent::RoomLoaded(Some(room(
            vec![
                message(5, me(), true),
                message(2, peer(), true),
                message(9, peer(), true),
            ],
            0,
        ))),
    );

    let view = screen.view(&cache);
    assert_eq!(view.title, "bo");
    let rows: Vec<(i64, bool)> = view
        .messages
        .iter()
        .map(|row| (row.message.id.0, row.outgoing))
        .collect();
    assert_eq!(rows, vec![(9, false), (5, true), (2, false)]);
}

#[test]
fn unmount_is_terminal() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(vec![message(2, peer(), false)], 1))));
    screen.handle(&mut cache, RoomEvent::MessagesVisible(vec![MessageId(2)]));

    screen.handle(&mut cache, RoomEvent::Unmounted);
    assert_eq!(screen.phase(), RoomPhase::Unmounted);
    assert!(screen.read_tracking().is_empty());

    assert!(screen.handle(&mut cache, RoomEvent::Mounted).is_empty());
    assert!(screen
        .handle(&mut cache, RoomEvent::SubscriptionPushed(Some(message(3, peer(), false))))
        .is_empty());
    assert_eq!(screen.phase(), RoomPhase::Unmounted);
    assert_eq!(screen.view(&cache).messages.len(), 1);
}

#[test]
fn queued_lines_send_one_at_a_time_with_their_own_payload() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(Vec::new(), 0))));

    let first = screen.handle(&mut cache, RoomEvent::MessageQueued("A".to_string()));
    assert_eq!(
        first,
        vec![RoomEffect::SendMessage {
            room_id: ROOM,
            payload: "A".to_string()
        }]
    );
    assert!(screen
        .handle(&mut cache, RoomEvent::MessageQueued("B".to_string()))
        .is_empty());
    assert_eq!(screen.queued(), 1);

    let next = screen.handle(
        &mut cache,
        RoomEvent::SendCompleted(Ok(MutationResult::success(MessageId(10)))),
    );
    assert_eq!(
        next,
        vec![RoomEffect::SendMessage {
            room_id: ROOM,
            payload: "B".to_string()
        }]
    );
    screen.handle(
        &mut cache,
        RoomEvent::SendCompleted(Ok(MutationResult::success(MessageId(11)))),
    );

    let rows: Vec<(i64, String)> = screen
        .view(&cache)
        .messages
        .iter()
        .map(|row| (row.message.id.0, row.message.payload.clone()))
        .collect();
    assert_eq!(rows, vec![(11, "B".to_string()), (10, "A".to_string())]);
    assert_eq!(screen.queued(), 0);
    assert_eq!(screen.draft(), "");
}

#[test]
fn failed_send_holds_back_the_queue_until_retried() {
    let mut cache = NormalizedCache::new();
    let mut screen = mounted_screen(&mut cache);
    screen.handle(&mut cache, RoomEvent::RoomLoaded(Some(room(Vec::new(), 0))));
    screen.handle(&mut cache, RoomEvent::MessageQueued("A".to_string()));
    screen.handle(&mut cache, RoomEvent::MessageQueued("B".to_string()));

    let after_failure = screen.handle(
        &mut cache,
        RoomEvent::SendCompleted(Err("connection reset".to_string())),
    );
    assert!(after_failure.is_empty());
    assert_eq!(screen.draft(), "A");
    assert_eq!(screen.queued(), 1);

    let retry = screen.handle(&mut cache, RoomEvent::SendRequested);
    assert_eq!(
        retry,
        vec![RoomEffect::SendMessage {
            room_id: ROOM,
            payload: "A".to_string()
        }]
    );
    let next = screen.handle(
        &mut cache,
        RoomEvent::SendCompleted(Ok(MutationResult::success(MessageId(10)))),
    );
    assert_eq!(
        next,
        vec![RoomEffect::SendMessage {
            room_id: ROOM,
            payload: "B".to_string()
        }]
    );
}
