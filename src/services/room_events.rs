use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dao::models::{QuestionEntity, RoomEntity, RoomId},
    dto::{
        events::{
            LikesEvent, QuestionRefEvent, RoomClosedEvent, RoomEvent,
            RoomSnapshotEvent,
        },
        question::QuestionSummary,
        room::RoomSummary,
    },
    state::SharedState,
};

pub const EVENT_NEW_QUESTION: &str = "newQuestion";
pub const EVENT_UPDATE_QUESTION: &str = "updateQuestion";
pub const EVENT_DELETE_QUESTION: &str = "deleteQuestion";
pub const EVENT_UPDATE_LIKES: &str = "updateLikes";
pub const EVENT_RECEIVE_HIGHLIGHT: &str = "receiveHighlight";
pub const EVENT_ROOM_CLOSED: &str = "roomClosed";
pub const EVENT_ROOM_SNAPSHOT: &str = "roomSnapshot";
pub const EVENT_ERROR: &str = "error";

/// Broadcast a freshly created question.
pub fn broadcast_new_question(state: &SharedState, question: &QuestionEntity) {
    publish(
        state,
        question.room_id,
        EVENT_NEW_QUESTION,
        &QuestionSummary::from(question),
    );
}

/// Broadcast the post-state of an edited or answered question.
pub fn broadcast_updated_question(state: &SharedState, question: &QuestionEntity) {
    publish(
        state,
        question.room_id,
        EVENT_UPDATE_QUESTION,
        &QuestionSummary::from(question),
    );
}

pub fn broadcast_deleted_question(state: &SharedState, question: &QuestionEntity) {
    let payload = QuestionRefEvent {
        question_id: question.question_id,
    };
    publish(state, question.room_id, EVENT_DELETE_QUESTION, &payload);
}

pub fn broadcast_likes(state: &SharedState, question: &QuestionEntity) {
    let payload = LikesEvent {
        question_id: question.question_id,
        likes: question.likes,
    };
    publish(state, question.room_id, EVENT_UPDATE_LIKES, &payload);
}

/// Broadcast the newly selected question.
pub fn broadcast_highlight(state: &SharedState, question: &QuestionEntity) {
    let payload = QuestionRefEvent {
        question_id: question.question_id,
    };
    publish(state, question.room_id, EVENT_RECEIVE_HIGHLIGHT, &payload);
}

pub fn broadcast_room_closed(state: &SharedState, room: &RoomEntity) {
    publish(state, room.id, EVENT_ROOM_CLOSED, &RoomClosedEvent {});
}

/// Build the snapshot sent privately to a connection joining `room`.
pub fn room_snapshot(
    room: &RoomEntity,
    questions: &[QuestionEntity],
) -> serde_json::Result<RoomEvent> {
    let payload = RoomSnapshotEvent {
        room: RoomSummary::from(room),
        questions: questions.iter().map(QuestionSummary::from).collect(),
    };
    RoomEvent::json(EVENT_ROOM_SNAPSHOT, &payload)
}

fn publish<T>(state: &SharedState, room_id: RoomId, event: &'static str, payload: &T)
where
    T: Serialize,
{
    match RoomEvent::json(event, payload) {
        Ok(event) => {
            let delivered = state.hub().publish(room_id, &event);
            debug!(room_id, event = event.event, delivered, "room event published");
        }
        Err(err) => warn!(room_id, event, error = %err, "failed to serialise room event"),
    }
}
