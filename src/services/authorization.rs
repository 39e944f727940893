//! Visitor-based permission checks.
//!
//! The visitor identifier is the only credential: authors may rewrite or
//! remove their own questions and a room's creator may close it. Likes and
//! selection are open to everyone.

use crate::{
    dao::models::{QuestionEntity, RoomEntity},
    error::ServiceError,
};

/// Whether `visitor_id` may edit or delete `question`.
pub fn can_mutate(question: &QuestionEntity, visitor_id: &str) -> bool {
    question.creator_id == visitor_id
}

/// Whether `visitor_id` may manage (close) `room`.
pub fn can_manage(room: &RoomEntity, visitor_id: &str) -> bool {
    room.creator_id == visitor_id
}

pub fn ensure_can_mutate(question: &QuestionEntity, visitor_id: &str) -> Result<(), ServiceError> {
    if can_mutate(question, visitor_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "question `{}` can only be changed by its author",
            question.question_id
        )))
    }
}

pub fn ensure_can_manage(room: &RoomEntity, visitor_id: &str) -> Result<(), ServiceError> {
    if can_manage(room, visitor_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "room `{}` can only be managed by its creator",
            room.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn question(creator_id: &str) -> QuestionEntity {
        QuestionEntity {
            room_id: 1,
            question_id: 1,
            creator_id: creator_id.into(),
            created_at: SystemTime::now(),
            text: "?".into(),
            likes: 0,
            is_answered: false,
            is_selected: false,
        }
    }

    #[test]
    fn only_the_author_mutates_a_question() {
        let q = question("author");
        assert!(can_mutate(&q, "author"));
        assert!(!can_mutate(&q, "someone-else"));
        assert!(!can_mutate(&q, ""));
        assert!(matches!(
            ensure_can_mutate(&q, "someone-else"),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn only_the_creator_manages_a_room() {
        let room = RoomEntity {
            id: 3,
            code: 4242,
            title: "Talk".into(),
            creator_id: "presenter".into(),
            created_at: SystemTime::now(),
            is_closed: false,
            attachment: None,
        };
        assert!(can_manage(&room, "presenter"));
        assert!(ensure_can_manage(&room, "presenter").is_ok());
        assert!(matches!(
            ensure_can_manage(&room, "attendee"),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
