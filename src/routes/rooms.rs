use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::warn;

use crate::{
    dao::models::RoomId,
    dto::room::{CreateRoomForm, RoomDetailResponse, RoomListResponse, RoomSummary},
    error::AppError,
    routes::visitor::{MaybeVisitor, Visitor},
    services::room_service::{self, RoomUpload},
    state::SharedState,
};

/// Extra room on top of the file limit for the multipart envelope and title.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Room lifecycle endpoints.
pub fn router(state: &SharedState) -> Router<SharedState> {
    let body_limit = state
        .config()
        .rooms
        .max_file_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/by-code/{code}", get(find_room_by_code))
        .route("/rooms/{room_id}", get(get_room).delete(close_room))
        .route("/rooms/{room_id}/file", get(download_file))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Open a new room. Expects a multipart body with a `title` and a `file` part.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    params(("X-Visitor-Id" = String, Header, description = "Visitor identifier of the presenter")),
    request_body(content = CreateRoomForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Room created", body = RoomSummary),
        (status = 400, description = "Missing title, file or visitor id")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Visitor(visitor_id): Visitor,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RoomSummary>), AppError> {
    let mut title = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("title") => title = Some(field.text().await?),
            Some("file") => {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
                    continue;
                }
                upload = Some(RoomUpload {
                    bytes: bytes.to_vec(),
                    content_type,
                    file_name,
                });
            }
            _ => {}
        }
    }

    let title = title.ok_or_else(|| AppError::BadRequest("missing `title` field".into()))?;
    let room = room_service::create_room(&state, &visitor_id, &title, upload).await?;
    Ok((StatusCode::CREATED, Json(RoomSummary::from(&room))))
}

/// List every room, oldest first.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Rooms with their count", body = RoomListResponse))
)]
pub async fn list_rooms(
    State(state): State<SharedState>,
) -> Result<Json<RoomListResponse>, AppError> {
    Ok(Json(room_service::list_rooms(&state).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/by-code/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Four digit join code")),
    responses(
        (status = 200, description = "Room using this code", body = RoomSummary),
        (status = 404, description = "No room uses this code")
    )
)]
pub async fn find_room_by_code(
    State(state): State<SharedState>,
    Path(code): Path<u16>,
) -> Result<Json<RoomSummary>, AppError> {
    Ok(Json(room_service::find_room_by_code(&state, code).await?))
}

/// Room with its questions, flagged for the requesting visitor.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Room detail", body = RoomDetailResponse),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    visitor: MaybeVisitor,
) -> Result<Json<RoomDetailResponse>, AppError> {
    Ok(Json(
        room_service::room_detail(&state, room_id, visitor.id()).await?,
    ))
}

/// Close a room. Only the visitor who created it may do so.
#[utoipa::path(
    delete,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("X-Visitor-Id" = String, Header, description = "Visitor identifier of the presenter")
    ),
    responses(
        (status = 200, description = "Room closed", body = RoomSummary),
        (status = 403, description = "Caller did not create the room"),
        (status = 409, description = "Room already closed")
    )
)]
pub async fn close_room(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    Visitor(visitor_id): Visitor,
) -> Result<Json<RoomSummary>, AppError> {
    let room = room_service::close_room(&state, room_id, &visitor_id).await?;
    Ok(Json(RoomSummary::from(&room)))
}

/// Download the presentation file attached to a room.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/file",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream", body = Vec<u8>),
        (status = 404, description = "Room or file not found")
    )
)]
pub async fn download_file(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
) -> Result<Response, AppError> {
    let download = room_service::download_file(&state, room_id).await?;

    let content_type = HeaderValue::from_str(&download.content_type).unwrap_or_else(|err| {
        warn!(room_id, error = %err, "stored content type is not a valid header value");
        HeaderValue::from_static("application/octet-stream")
    });
    let disposition = attachment_disposition(&download.file_name)?;

    Ok((
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        download.bytes,
    )
        .into_response())
}

/// `Content-Disposition` value with the file name percent-encoded.
fn attachment_disposition(file_name: &str) -> Result<HeaderValue, AppError> {
    let value = format!("attachment; filename=\"{}\"", urlencoding::encode(file_name));
    HeaderValue::from_str(&value)
        .map_err(|err| AppError::Internal(format!("invalid content disposition: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_percent_encoded() {
        let disposition = |name: &str| {
            attachment_disposition(name)
                .unwrap()
                .to_str()
                .unwrap()
                .to_owned()
        };
        assert_eq!(disposition("slides.pdf"), "attachment; filename=\"slides.pdf\"");
        assert_eq!(disposition("my talk.pdf"), "attachment; filename=\"my%20talk.pdf\"");
        assert_eq!(disposition("\"q\"\r\n"), "attachment; filename=\"%22q%22%0D%0A\"");
        assert_eq!(disposition("é"), "attachment; filename=\"%C3%A9\"");
    }
}
