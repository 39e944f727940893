use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dao::models::{QuestionId, RoomId},
    dto::question::{
        AnsweredRequest, CreateQuestionRequest, LikesResponse, QuestionSummary, QuestionView,
        SelectQuestionRequest, UpdateQuestionRequest,
    },
    error::AppError,
    routes::visitor::{MaybeVisitor, Visitor},
    services::question_service,
    state::SharedState,
};

/// Question, like and selection endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/rooms/{room_id}/questions",
            get(list_questions).post(create_question),
        )
        .route(
            "/rooms/{room_id}/questions/{question_id}",
            get(get_question)
                .patch(edit_question)
                .delete(delete_question),
        )
        .route(
            "/rooms/{room_id}/questions/{question_id}/likes",
            post(like_question).delete(unlike_question),
        )
        .route(
            "/rooms/{room_id}/questions/{question_id}/answered",
            put(mark_answered),
        )
        .route("/rooms/{room_id}/selection", put(select_question))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/questions",
    tag = "questions",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Questions ordered by id", body = [QuestionView]),
        (status = 404, description = "Room not found")
    )
)]
pub async fn list_questions(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    visitor: MaybeVisitor,
) -> Result<Json<Vec<QuestionView>>, AppError> {
    Ok(Json(
        question_service::list_questions(&state, room_id, visitor.id()).await?,
    ))
}

/// Submit a question to an open room.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/questions",
    tag = "questions",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("X-Visitor-Id" = String, Header, description = "Visitor identifier of the author")
    ),
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question created", body = QuestionView),
        (status = 400, description = "Empty or oversized text"),
        (status = 409, description = "Room is closed")
    )
)]
pub async fn create_question(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    Visitor(visitor_id): Visitor,
    Valid(Json(payload)): Valid<Json<CreateQuestionRequest>>,
) -> Result<(StatusCode, Json<QuestionView>), AppError> {
    let question =
        question_service::create_question(&state, room_id, &visitor_id, &payload.text).await?;
    Ok((
        StatusCode::CREATED,
        Json(QuestionView::for_visitor(&question, &visitor_id)),
    ))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/questions/{question_id}",
    tag = "questions",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("question_id" = String, Path, description = "Identifier of the question within the room")
    ),
    responses(
        (status = 200, description = "Question", body = QuestionView),
        (status = 404, description = "Question not found")
    )
)]
pub async fn get_question(
    State(state): State<SharedState>,
    Path((room_id, question_id)): Path<(RoomId, QuestionId)>,
    visitor: MaybeVisitor,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(
        question_service::get_question(&state, room_id, question_id, visitor.id()).await?,
    ))
}

/// Replace the text of a question. Author only.
#[utoipa::path(
    patch,
    path = "/rooms/{room_id}/questions/{question_id}",
    tag = "questions",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("question_id" = String, Path, description = "Identifier of the question within the room"),
        ("X-Visitor-Id" = String, Header, description = "Visitor identifier of the author")
    ),
    request_body = UpdateQuestionRequest,
    responses(
        (status = 200, description = "Question updated", body = QuestionView),
        (status = 403, description = "Caller is not the author"),
        (status = 409, description = "Room is closed")
    )
)]
pub async fn edit_question(
    State(state): State<SharedState>,
    Path((room_id, question_id)): Path<(RoomId, QuestionId)>,
    Visitor(visitor_id): Visitor,
    Valid(Json(payload)): Valid<Json<UpdateQuestionRequest>>,
) -> Result<Json<QuestionView>, AppError> {
    let question = question_service::edit_question(
        &state,
        room_id,
        question_id,
        &visitor_id,
        &payload.text,
    )
    .await?;
    Ok(Json(QuestionView::for_visitor(&question, &visitor_id)))
}

/// Delete a question. Author only.
#[utoipa::path(
    delete,
    path = "/rooms/{room_id}/questions/{question_id}",
    tag = "questions",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("question_id" = String, Path, description = "Identifier of the question within the room"),
        ("X-Visitor-Id" = String, Header, description = "Visitor identifier of the author")
    ),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn delete_question(
    State(state): State<SharedState>,
    Path((room_id, question_id)): Path<(RoomId, QuestionId)>,
    Visitor(visitor_id): Visitor,
) -> Result<StatusCode, AppError> {
    question_service::delete_question(&state, room_id, question_id, &visitor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/questions/{question_id}/likes",
    tag = "questions",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("question_id" = String, Path, description = "Identifier of the question within the room")
    ),
    responses((status = 200, description = "Like added", body = LikesResponse))
)]
pub async fn like_question(
    State(state): State<SharedState>,
    Path((room_id, question_id)): Path<(RoomId, QuestionId)>,
) -> Result<Json<LikesResponse>, AppError> {
    let question = question_service::like_question(&state, room_id, question_id).await?;
    Ok(Json(LikesResponse {
        question_id: question.question_id,
        likes: question.likes,
    }))
}

#[utoipa::path(
    delete,
    path = "/rooms/{room_id}/questions/{question_id}/likes",
    tag = "questions",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("question_id" = String, Path, description = "Identifier of the question within the room")
    ),
    responses(
        (status = 200, description = "Like removed", body = LikesResponse),
        (status = 400, description = "Question has no likes")
    )
)]
pub async fn unlike_question(
    State(state): State<SharedState>,
    Path((room_id, question_id)): Path<(RoomId, QuestionId)>,
) -> Result<Json<LikesResponse>, AppError> {
    let question = question_service::unlike_question(&state, room_id, question_id).await?;
    Ok(Json(LikesResponse {
        question_id: question.question_id,
        likes: question.likes,
    }))
}

#[utoipa::path(
    put,
    path = "/rooms/{room_id}/questions/{question_id}/answered",
    tag = "questions",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("question_id" = String, Path, description = "Identifier of the question within the room")
    ),
    request_body = AnsweredRequest,
    responses((status = 200, description = "Answered flag updated", body = QuestionSummary))
)]
pub async fn mark_answered(
    State(state): State<SharedState>,
    Path((room_id, question_id)): Path<(RoomId, QuestionId)>,
    Json(payload): Json<AnsweredRequest>,
) -> Result<Json<QuestionSummary>, AppError> {
    let question =
        question_service::mark_answered(&state, room_id, question_id, payload.is_answered).await?;
    Ok(Json(QuestionSummary::from(&question)))
}

/// Spotlight one question of the room, clearing the previous selection.
#[utoipa::path(
    put,
    path = "/rooms/{room_id}/selection",
    tag = "questions",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    request_body = SelectQuestionRequest,
    responses(
        (status = 200, description = "Question selected", body = QuestionSummary),
        (status = 404, description = "Question not found; the previous selection is kept")
    )
)]
pub async fn select_question(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    Json(payload): Json<SelectQuestionRequest>,
) -> Result<Json<QuestionSummary>, AppError> {
    let question =
        question_service::select_question(&state, room_id, payload.question_id).await?;
    Ok(Json(QuestionSummary::from(&question)))
}
