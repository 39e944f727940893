use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Q&A backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::visitor::get_visitor,
        crate::routes::rooms::create_room,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::find_room_by_code,
        crate::routes::rooms::get_room,
        crate::routes::rooms::close_room,
        crate::routes::rooms::download_file,
        crate::routes::questions::list_questions,
        crate::routes::questions::create_question,
        crate::routes::questions::get_question,
        crate::routes::questions::edit_question,
        crate::routes::questions::delete_question,
        crate::routes::questions::like_question,
        crate::routes::questions::unlike_question,
        crate::routes::questions::mark_answered,
        crate::routes::questions::select_question,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::visitor::VisitorResponse,
            crate::dto::room::RoomSummary,
            crate::dto::room::AttachmentSummary,
            crate::dto::room::RoomListResponse,
            crate::dto::room::RoomDetailResponse,
            crate::dto::room::CreateRoomForm,
            crate::dto::question::QuestionSummary,
            crate::dto::question::QuestionView,
            crate::dto::question::CreateQuestionRequest,
            crate::dto::question::UpdateQuestionRequest,
            crate::dto::question::SelectQuestionRequest,
            crate::dto::question::AnsweredRequest,
            crate::dto::question::LikesResponse,
            crate::dto::events::QuestionRefEvent,
            crate::dto::events::LikesEvent,
            crate::dto::events::RoomClosedEvent,
            crate::dto::events::RoomSnapshotEvent,
            crate::dto::events::GatewayErrorEvent,
            crate::dto::ws::ClientMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "visitor", description = "Pseudonymous visitor identity"),
        (name = "rooms", description = "Room lifecycle and presentation files"),
        (name = "questions", description = "Questions, likes and the spotlight"),
        (name = "realtime", description = "WebSocket and server-sent event streams"),
    )
)]
pub struct ApiDoc;
