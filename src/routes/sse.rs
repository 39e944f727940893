use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{dao::models::RoomId, error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/events",
    tag = "realtime",
    params(("room_id" = String, Path, description = "Identifier of the room to observe")),
    responses(
        (status = 200, description = "Room event stream, starting with a `roomSnapshot` event", content_type = "text/event-stream", body = String),
        (status = 404, description = "Room not found")
    )
)]
/// Stream the realtime events of one room.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_room(&state, room_id).await?;
    info!(room_id, "new room SSE connection");
    let keep_alive = state.config().sse_keep_alive();
    Ok(sse_service::to_sse_stream(state, subscription, keep_alive))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{room_id}/events", get(room_stream))
}
