use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    dao::{
        models::{LikeDelta, QuestionEntity, QuestionId, RoomEntity, RoomId},
        room_store::RoomStore,
    },
    dto::question::QuestionView,
    error::ServiceError,
    services::{authorization, room_events, room_service::phase_error},
    state::{SharedState, room::ensure_open},
};

/// Load a room and make sure it still accepts question mutations.
async fn open_room(
    state: &SharedState,
    store: &Arc<dyn RoomStore>,
    room_id: RoomId,
) -> Result<RoomEntity, ServiceError> {
    let room = state.store_call("get_room", store.get_room(room_id)).await?;
    ensure_open(&room).map_err(phase_error)?;
    Ok(room)
}

/// Trim `text` and enforce the configured maximum length.
fn prepare_text(state: &SharedState, text: &str) -> Result<String, ServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ServiceError::InvalidInput(
            "question text must not be empty".into(),
        ));
    }

    let max = state.config().questions.max_length;
    let length = text.chars().count();
    if length > max {
        return Err(ServiceError::InvalidInput(format!(
            "question text must be at most {max} characters (got {length})"
        )));
    }
    Ok(text.to_owned())
}

/// Submit a question to an open room.
pub async fn create_question(
    state: &SharedState,
    room_id: RoomId,
    visitor_id: &str,
    text: &str,
) -> Result<QuestionEntity, ServiceError> {
    let text = prepare_text(state, text)?;
    let store = state.require_room_store().await?;
    open_room(state, &store, room_id).await?;

    let question = state
        .store_call(
            "create_question",
            store.create_question(room_id, visitor_id.to_owned(), text),
        )
        .await?;

    info!(room_id, question_id = question.question_id, "question created");
    room_events::broadcast_new_question(state, &question);
    Ok(question)
}

pub async fn list_questions(
    state: &SharedState,
    room_id: RoomId,
    visitor_id: &str,
) -> Result<Vec<QuestionView>, ServiceError> {
    let store = state.require_room_store().await?;
    let questions = state
        .store_call("list_questions", store.list_questions(room_id))
        .await?;
    Ok(questions
        .iter()
        .map(|question| QuestionView::for_visitor(question, visitor_id))
        .collect())
}

pub async fn get_question(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
    visitor_id: &str,
) -> Result<QuestionView, ServiceError> {
    let store = state.require_room_store().await?;
    let question = state
        .store_call("get_question", store.get_question(room_id, question_id))
        .await?;
    Ok(QuestionView::for_visitor(&question, visitor_id))
}

/// Replace the text of a question. Only its author may do so.
pub async fn edit_question(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
    visitor_id: &str,
    text: &str,
) -> Result<QuestionEntity, ServiceError> {
    let text = prepare_text(state, text)?;
    let store = state.require_room_store().await?;
    open_room(state, &store, room_id).await?;

    let current = state
        .store_call("get_question", store.get_question(room_id, question_id))
        .await?;
    authorization::ensure_can_mutate(&current, visitor_id)?;

    let question = state
        .store_call(
            "update_question_text",
            store.update_question_text(room_id, question_id, text),
        )
        .await?;

    debug!(room_id, question_id, "question edited");
    room_events::broadcast_updated_question(state, &question);
    Ok(question)
}

/// Remove a question. Only its author may do so.
pub async fn delete_question(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
    visitor_id: &str,
) -> Result<QuestionEntity, ServiceError> {
    let store = state.require_room_store().await?;
    open_room(state, &store, room_id).await?;

    let current = state
        .store_call("get_question", store.get_question(room_id, question_id))
        .await?;
    authorization::ensure_can_mutate(&current, visitor_id)?;

    let removed = state
        .store_call(
            "delete_question",
            store.delete_question(room_id, question_id),
        )
        .await?;

    info!(room_id, question_id, "question deleted");
    room_events::broadcast_deleted_question(state, &removed);
    Ok(removed)
}

pub async fn like_question(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
) -> Result<QuestionEntity, ServiceError> {
    adjust_likes(state, room_id, question_id, LikeDelta::Increment).await
}

/// Remove one like. A question without likes is left untouched and the call fails.
pub async fn unlike_question(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
) -> Result<QuestionEntity, ServiceError> {
    adjust_likes(state, room_id, question_id, LikeDelta::Decrement).await
}

async fn adjust_likes(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
    delta: LikeDelta,
) -> Result<QuestionEntity, ServiceError> {
    let store = state.require_room_store().await?;
    open_room(state, &store, room_id).await?;

    let question = state
        .store_call(
            "adjust_likes",
            store.adjust_likes(room_id, question_id, delta),
        )
        .await?;

    debug!(room_id, question_id, likes = question.likes, ?delta, "likes adjusted");
    room_events::broadcast_likes(state, &question);
    Ok(question)
}

/// Spotlight a question, clearing any previous selection in the room.
pub async fn select_question(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
) -> Result<QuestionEntity, ServiceError> {
    let store = state.require_room_store().await?;
    open_room(state, &store, room_id).await?;

    let question = state
        .store_call(
            "select_question",
            store.select_question(room_id, question_id),
        )
        .await?;

    info!(room_id, question_id, "question selected");
    room_events::broadcast_highlight(state, &question);
    Ok(question)
}

pub async fn mark_answered(
    state: &SharedState,
    room_id: RoomId,
    question_id: QuestionId,
    answered: bool,
) -> Result<QuestionEntity, ServiceError> {
    let store = state.require_room_store().await?;
    open_room(state, &store, room_id).await?;

    let question = state
        .store_call(
            "set_answered",
            store.set_answered(room_id, question_id, answered),
        )
        .await?;

    debug!(room_id, question_id, answered, "question answered flag updated");
    room_events::broadcast_updated_question(state, &question);
    Ok(question)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::{memory::MemoryRoomStore, testing::InterferingRoomStore},
        dto::events::RoomEvent,
        services::room_service,
        state::{AppState, Connection},
    };

    async fn state() -> SharedState {
        let mut config = AppConfig::default();
        config.rooms.require_file = false;
        config.questions.max_length = 20;
        let state = AppState::new(config);
        state
            .install_room_store(Arc::new(MemoryRoomStore::default()))
            .await;
        state
    }

    async fn room(state: &SharedState) -> RoomEntity {
        room_service::create_room(state, "presenter", "Talk A", None)
            .await
            .unwrap()
    }

    fn observe(state: &SharedState, room_id: RoomId) -> UnboundedReceiver<RoomEvent> {
        let (connection, rx) = Connection::open();
        state.hub().join(&connection, room_id);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<RoomEvent>) -> Vec<RoomEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn create_broadcasts_new_question() {
        let state = state().await;
        let room = room(&state).await;
        let mut rx = observe(&state, room.id);

        let question = create_question(&state, room.id, "v1", "  Why Rust?  ")
            .await
            .unwrap();

        assert_eq!(question.text, "Why Rust?");
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, room_events::EVENT_NEW_QUESTION);
        assert_eq!(events[0].data["question_id"], json!("1"));
        assert_eq!(events[0].data["text"], json!("Why Rust?"));
    }

    #[tokio::test]
    async fn invalid_text_is_rejected_without_events() {
        let state = state().await;
        let room = room(&state).await;
        let mut rx = observe(&state, room.id);

        assert!(matches!(
            create_question(&state, room.id, "v1", "   ").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            create_question(&state, room.id, "v1", "this question is far too long").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn only_authors_edit_or_delete() {
        let state = state().await;
        let room = room(&state).await;
        let question = create_question(&state, room.id, "v1", "Original")
            .await
            .unwrap();
        let mut rx = observe(&state, room.id);

        assert!(matches!(
            edit_question(&state, room.id, question.question_id, "v2", "Hijacked").await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            delete_question(&state, room.id, question.question_id, "v2").await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(drain(&mut rx).is_empty());

        let edited = edit_question(&state, room.id, question.question_id, "v1", "Edited")
            .await
            .unwrap();
        assert_eq!(edited.text, "Edited");

        delete_question(&state, room.id, question.question_id, "v1")
            .await
            .unwrap();
        let names: Vec<_> = drain(&mut rx).into_iter().map(|event| event.event).collect();
        assert_eq!(
            names,
            vec![
                room_events::EVENT_UPDATE_QUESTION,
                room_events::EVENT_DELETE_QUESTION
            ]
        );

        assert!(matches!(
            get_question(&state, room.id, question.question_id, "v1").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn likes_never_go_negative() {
        let state = state().await;
        let room = room(&state).await;
        let question = create_question(&state, room.id, "v1", "Likes?").await.unwrap();
        let mut rx = observe(&state, room.id);

        assert!(matches!(
            unlike_question(&state, room.id, question.question_id).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(drain(&mut rx).is_empty());

        let liked = like_question(&state, room.id, question.question_id)
            .await
            .unwrap();
        assert_eq!(liked.likes, 1);
        let unliked = unlike_question(&state, room.id, question.question_id)
            .await
            .unwrap();
        assert_eq!(unliked.likes, 0);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].data,
            json!({ "question_id": question.question_id.to_string(), "likes": 1 })
        );
        assert_eq!(events[1].data["likes"], json!(0));
    }

    #[tokio::test]
    async fn selecting_moves_the_highlight() {
        let state = state().await;
        let room = room(&state).await;
        let first = create_question(&state, room.id, "v1", "First").await.unwrap();
        let second = create_question(&state, room.id, "v2", "Second").await.unwrap();
        let mut rx = observe(&state, room.id);

        select_question(&state, room.id, first.question_id)
            .await
            .unwrap();
        select_question(&state, room.id, second.question_id)
            .await
            .unwrap();

        let questions = list_questions(&state, room.id, "v1").await.unwrap();
        let selected: Vec<_> = questions
            .iter()
            .filter(|view| view.question.is_selected)
            .map(|view| view.question.question_id)
            .collect();
        assert_eq!(selected, vec![second.question_id]);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.event == room_events::EVENT_RECEIVE_HIGHLIGHT));
        assert_eq!(
            events[1].data,
            json!({ "question_id": second.question_id.to_string() })
        );

        assert!(matches!(
            select_question(&state, room.id, 404).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mark_answered_broadcasts_the_update() {
        let state = state().await;
        let room = room(&state).await;
        let question = create_question(&state, room.id, "v1", "Done?").await.unwrap();
        let mut rx = observe(&state, room.id);

        let answered = mark_answered(&state, room.id, question.question_id, true)
            .await
            .unwrap();
        assert!(answered.is_answered);

        let events = drain(&mut rx);
        assert_eq!(events[0].event, room_events::EVENT_UPDATE_QUESTION);
        assert_eq!(events[0].data["is_answered"], json!(true));
    }

    #[tokio::test]
    async fn closed_rooms_reject_every_mutation() {
        let state = state().await;
        let room = room(&state).await;
        let question = create_question(&state, room.id, "v1", "Before").await.unwrap();
        room_service::close_room(&state, room.id, "presenter")
            .await
            .unwrap();
        let mut rx = observe(&state, room.id);
        let qid = question.question_id;

        assert!(matches!(
            create_question(&state, room.id, "v1", "After").await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            edit_question(&state, room.id, qid, "v1", "Changed").await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            delete_question(&state, room.id, qid, "v1").await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            like_question(&state, room.id, qid).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            select_question(&state, room.id, qid).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            mark_answered(&state, room.id, qid, true).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(drain(&mut rx).is_empty());

        let retained = list_questions(&state, room.id, "v1").await.unwrap();
        assert_eq!(retained.len(), 1);
        assert!(retained[0].is_mine);
    }

    #[tokio::test]
    async fn room_closed_after_the_open_check_rejects_the_write() {
        let attempts: [&str; 6] = ["edit", "delete", "like", "unlike", "select", "answered"];
        for attempt in attempts {
            let store = InterferingRoomStore::default();
            let state = state().await;
            state.install_room_store(Arc::new(store.clone())).await;
            let room = room(&state).await;
            let question = create_question(&state, room.id, "v1", "Before").await.unwrap();
            let qid = question.question_id;
            like_question(&state, room.id, qid).await.unwrap();
            let mut rx = observe(&state, room.id);

            store.close_after_next_read();
            let result = match attempt {
                "edit" => edit_question(&state, room.id, qid, "v1", "Changed").await,
                "delete" => delete_question(&state, room.id, qid, "v1").await,
                "like" => like_question(&state, room.id, qid).await,
                "unlike" => unlike_question(&state, room.id, qid).await,
                "select" => select_question(&state, room.id, qid).await,
                _ => mark_answered(&state, room.id, qid, true).await,
            };

            assert!(
                matches!(result, Err(ServiceError::Conflict(_))),
                "{attempt} went through on a closed room"
            );
            assert!(drain(&mut rx).is_empty(), "{attempt} published an event");
            let kept = get_question(&state, room.id, qid, "v1").await.unwrap();
            assert_eq!(kept.question.text, "Before");
            assert_eq!(kept.question.likes, 1);
            assert!(!kept.question.is_selected);
            assert!(!kept.question.is_answered);
        }
    }

    #[tokio::test]
    async fn degraded_state_fails_fast() {
        let state = state().await;
        let room = room(&state).await;
        state.clear_room_store().await;

        assert!(matches!(
            create_question(&state, room.id, "v1", "Anyone?").await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn live_session_walkthrough() {
        let state = state().await;
        let room = room(&state).await;
        assert!((1000..=9999).contains(&room.code));

        let q1 = create_question(&state, room.id, "V1", "First question")
            .await
            .unwrap();
        assert!(!q1.is_selected);
        assert_eq!(q1.likes, 0);

        let liked = like_question(&state, room.id, q1.question_id).await.unwrap();
        assert_eq!(liked.likes, 1);

        let selected = select_question(&state, room.id, q1.question_id)
            .await
            .unwrap();
        assert!(selected.is_selected);

        let q2 = create_question(&state, room.id, "V2", "Second question")
            .await
            .unwrap();
        select_question(&state, room.id, q2.question_id)
            .await
            .unwrap();
        let q1_now = get_question(&state, room.id, q1.question_id, "V1")
            .await
            .unwrap();
        assert!(!q1_now.question.is_selected);

        room_service::close_room(&state, room.id, "presenter")
            .await
            .unwrap();
        assert!(matches!(
            create_question(&state, room.id, "V1", "Too late").await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
