//! Question projections and request payloads.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{QuestionEntity, QuestionId, RoomId},
    dto::{format_system_time, validation::validate_question_text},
};

/// Canonical public representation of a question.
///
/// Used by every REST response and realtime event so clients see one shape.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionSummary {
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String, example = "3")]
    pub question_id: QuestionId,
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String, example = "7")]
    pub room_id: RoomId,
    pub text: String,
    pub likes: u64,
    pub is_answered: bool,
    pub is_selected: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<&QuestionEntity> for QuestionSummary {
    fn from(question: &QuestionEntity) -> Self {
        Self {
            question_id: question.question_id,
            room_id: question.room_id,
            text: question.text.clone(),
            likes: question.likes,
            is_answered: question.is_answered,
            is_selected: question.is_selected,
            created_at: format_system_time(question.created_at),
        }
    }
}

impl From<QuestionEntity> for QuestionSummary {
    fn from(question: QuestionEntity) -> Self {
        Self::from(&question)
    }
}

/// Question as seen by a specific visitor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: QuestionSummary,
    /// Whether the requesting visitor authored the question.
    pub is_mine: bool,
}

impl QuestionView {
    pub fn for_visitor(question: &QuestionEntity, visitor_id: &str) -> Self {
        Self {
            question: QuestionSummary::from(question),
            is_mine: question.creator_id == visitor_id,
        }
    }
}

/// Body of `POST /rooms/{room_id}/questions`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQuestionRequest {
    pub text: String,
}

impl Validate for CreateQuestionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(err) = validate_question_text(&self.text) {
            errors.add("text", err);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of `PATCH /rooms/{room_id}/questions/{question_id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuestionRequest {
    pub text: String,
}

impl Validate for UpdateQuestionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(err) = validate_question_text(&self.text) {
            errors.add("text", err);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of `PUT /rooms/{room_id}/selection`. The id may be sent as a string or a number.
#[serde_as]
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectQuestionRequest {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[schema(value_type = String, example = "3")]
    pub question_id: QuestionId,
}

/// Body of `PUT /rooms/{room_id}/questions/{question_id}/answered`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnsweredRequest {
    pub is_answered: bool,
}

/// Like counter after a like or unlike.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LikesResponse {
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub question_id: QuestionId,
    pub likes: u64,
}
