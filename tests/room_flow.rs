use std::sync::Arc;

use spotlight_back::{
    config::AppConfig,
    dao::room_store::memory::MemoryRoomStore,
    dto::events::RoomEvent,
    error::ServiceError,
    services::{question_service, room_service},
    state::{AppState, Connection, SharedState},
};
use tokio::sync::mpsc::UnboundedReceiver;

async fn memory_state() -> SharedState {
    let mut config = AppConfig::default();
    config.rooms.require_file = false;
    let state = AppState::new(config);
    state
        .install_room_store(Arc::new(MemoryRoomStore::default()))
        .await;
    state
}

fn drain(rx: &mut UnboundedReceiver<RoomEvent>) -> Vec<RoomEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn observers_follow_a_full_session() {
    let state = memory_state().await;
    let room = room_service::create_room(&state, "host", "Weekly all-hands", None)
        .await
        .unwrap();

    let (observer, mut events) = Connection::open();
    assert!(state.hub().join(&observer, room.id));

    let first = question_service::create_question(&state, room.id, "alice", "  When is the release? ")
        .await
        .unwrap();
    assert_eq!(first.question_id, 1);
    assert_eq!(first.text, "When is the release?");

    let second = question_service::create_question(&state, room.id, "bob", "Any hiring plans?")
        .await
        .unwrap();
    assert_eq!(second.question_id, 2);

    question_service::like_question(&state, room.id, 1).await.unwrap();
    question_service::like_question(&state, room.id, 1).await.unwrap();
    let unliked = question_service::unlike_question(&state, room.id, 1)
        .await
        .unwrap();
    assert_eq!(unliked.likes, 1);

    question_service::select_question(&state, room.id, 1).await.unwrap();
    question_service::select_question(&state, room.id, 2).await.unwrap();

    let questions = question_service::list_questions(&state, room.id, "alice")
        .await
        .unwrap();
    let selected: Vec<_> = questions
        .iter()
        .filter(|view| view.question.is_selected)
        .map(|view| view.question.question_id)
        .collect();
    assert_eq!(selected, vec![2]);
    assert!(questions[0].is_mine);
    assert!(!questions[1].is_mine);

    room_service::close_room(&state, room.id, "host").await.unwrap();

    let names: Vec<_> = drain(&mut events).iter().map(|event| event.event).collect();
    assert_eq!(
        names,
        vec![
            "newQuestion",
            "newQuestion",
            "updateLikes",
            "updateLikes",
            "updateLikes",
            "receiveHighlight",
            "receiveHighlight",
            "roomClosed",
        ]
    );
}

#[tokio::test]
async fn events_stay_inside_their_room() {
    let state = memory_state().await;
    let first = room_service::create_room(&state, "host", "First", None)
        .await
        .unwrap();
    let second = room_service::create_room(&state, "host", "Second", None)
        .await
        .unwrap();
    assert_ne!(first.code, second.code);

    let (observer, mut events) = Connection::open();
    state.hub().join(&observer, second.id);

    question_service::create_question(&state, first.id, "alice", "Only in the first room")
        .await
        .unwrap();
    assert!(drain(&mut events).is_empty());

    let question = question_service::create_question(&state, second.id, "alice", "Here")
        .await
        .unwrap();
    assert_eq!(question.question_id, 1);

    let received = drain(&mut events);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data["room_id"], second.id.to_string());
}

#[tokio::test]
async fn rejected_mutations_publish_nothing() {
    let state = memory_state().await;
    let room = room_service::create_room(&state, "host", "Town hall", None)
        .await
        .unwrap();
    question_service::create_question(&state, room.id, "alice", "First")
        .await
        .unwrap();

    let (observer, mut events) = Connection::open();
    state.hub().join(&observer, room.id);

    let forbidden = question_service::edit_question(&state, room.id, 1, "mallory", "Hijacked").await;
    assert!(matches!(forbidden, Err(ServiceError::Forbidden(_))));

    let at_zero = question_service::unlike_question(&state, room.id, 1).await;
    assert!(matches!(at_zero, Err(ServiceError::InvalidInput(_))));

    let missing = question_service::select_question(&state, room.id, 42).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let not_owner = room_service::close_room(&state, room.id, "alice").await;
    assert!(matches!(not_owner, Err(ServiceError::Forbidden(_))));

    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn disconnect_stops_delivery() {
    let state = memory_state().await;
    let room = room_service::create_room(&state, "host", "Retro", None)
        .await
        .unwrap();

    let (observer, mut events) = Connection::open();
    state.hub().join(&observer, room.id);
    assert_eq!(state.hub().subscriber_count(room.id), 1);

    assert_eq!(state.hub().disconnect(observer.id), 1);
    assert_eq!(state.hub().subscriber_count(room.id), 0);

    question_service::create_question(&state, room.id, "alice", "Anyone there?")
        .await
        .unwrap();
    assert!(drain(&mut events).is_empty());
}
