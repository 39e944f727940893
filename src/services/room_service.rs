use tracing::info;

use crate::{
    dao::models::{NewRoomEntity, RoomEntity, RoomFileEntity, RoomId},
    dto::{
        question::QuestionView,
        room::{RoomDetailResponse, RoomListResponse, RoomSummary},
    },
    error::ServiceError,
    services::{authorization, room_events},
    state::{
        SharedState,
        room::{RoomPhase, RoomPhaseError},
    },
};

/// Longest accepted room title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const FALLBACK_FILE_NAME: &str = "presentation";

/// Upload received alongside a room creation request.
#[derive(Debug, Default)]
pub struct RoomUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// File ready to be streamed back to a client.
#[derive(Debug)]
pub struct RoomDownload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Create a new open room owned by `visitor_id`.
pub async fn create_room(
    state: &SharedState,
    visitor_id: &str,
    title: &str,
    upload: Option<RoomUpload>,
) -> Result<RoomEntity, ServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::InvalidInput("room title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "room title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }

    let settings = &state.config().rooms;
    if settings.require_file && upload.is_none() {
        return Err(ServiceError::InvalidInput(
            "a presentation file is required".into(),
        ));
    }
    if upload
        .as_ref()
        .is_some_and(|upload| upload.bytes.len() > settings.max_file_bytes)
    {
        return Err(ServiceError::InvalidInput(format!(
            "file exceeds the {} byte limit",
            settings.max_file_bytes
        )));
    }

    let file = upload.map(|upload| RoomFileEntity {
        bytes: upload.bytes,
        content_type: upload.content_type.filter(|value| !value.is_empty()),
        file_name: upload.file_name.filter(|value| !value.is_empty()),
    });

    let store = state.require_room_store().await?;
    let room = state
        .store_call(
            "create_room",
            store.create_room(NewRoomEntity {
                title: title.to_owned(),
                creator_id: visitor_id.to_owned(),
                file,
            }),
        )
        .await?;

    info!(room_id = room.id, code = room.code, "room created");
    Ok(room)
}

/// Every room, oldest first.
pub async fn list_rooms(state: &SharedState) -> Result<RoomListResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let rooms = state.store_call("list_rooms", store.list_rooms()).await?;
    Ok(RoomListResponse {
        count: rooms.len(),
        rooms: rooms.iter().map(RoomSummary::from).collect(),
    })
}

pub async fn get_room(state: &SharedState, room_id: RoomId) -> Result<RoomEntity, ServiceError> {
    let store = state.require_room_store().await?;
    state.store_call("get_room", store.get_room(room_id)).await
}

/// Room with its questions, as seen by `visitor_id`.
pub async fn room_detail(
    state: &SharedState,
    room_id: RoomId,
    visitor_id: &str,
) -> Result<RoomDetailResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let room = state.store_call("get_room", store.get_room(room_id)).await?;
    let questions = state
        .store_call("list_questions", store.list_questions(room_id))
        .await?;

    Ok(RoomDetailResponse {
        is_owner: authorization::can_manage(&room, visitor_id),
        room: RoomSummary::from(&room),
        questions: questions
            .iter()
            .map(|question| QuestionView::for_visitor(question, visitor_id))
            .collect(),
    })
}

pub async fn find_room_by_code(state: &SharedState, code: u16) -> Result<RoomSummary, ServiceError> {
    let store = state.require_room_store().await?;
    state
        .store_call("find_room_by_code", store.find_room_by_code(code))
        .await?
        .map(RoomSummary::from)
        .ok_or_else(|| ServiceError::NotFound(format!("no room uses code `{code}`")))
}

/// Close a room for good. Only its creator may do so.
pub async fn close_room(
    state: &SharedState,
    room_id: RoomId,
    visitor_id: &str,
) -> Result<RoomEntity, ServiceError> {
    let store = state.require_room_store().await?;
    let room = state.store_call("get_room", store.get_room(room_id)).await?;

    authorization::ensure_can_manage(&room, visitor_id)?;
    RoomPhase::of(&room).close(room_id).map_err(phase_error)?;

    let closed = state
        .store_call("close_room", store.close_room(room_id))
        .await?;

    info!(room_id, "room closed");
    room_events::broadcast_room_closed(state, &closed);
    Ok(closed)
}

/// Presentation file of a room, with content type and file name fallbacks applied.
pub async fn download_file(
    state: &SharedState,
    room_id: RoomId,
) -> Result<RoomDownload, ServiceError> {
    let store = state.require_room_store().await?;
    let room = state.store_call("get_room", store.get_room(room_id)).await?;
    let file = state
        .store_call("room_file", store.room_file(room_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` has no file")))?;

    Ok(RoomDownload {
        bytes: file.bytes,
        content_type: file
            .content_type
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_owned()),
        file_name: file
            .file_name
            .unwrap_or_else(|| file_name_from_title(&room.title)),
    })
}

/// Derive a download name from a room title: anything but letters and digits becomes `_`.
pub fn file_name_from_title(title: &str) -> String {
    let name: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if name.chars().all(|c| c == '_') {
        FALLBACK_FILE_NAME.to_owned()
    } else {
        name
    }
}

pub(crate) fn phase_error(err: RoomPhaseError) -> ServiceError {
    ServiceError::Conflict(err.to_string())
}
