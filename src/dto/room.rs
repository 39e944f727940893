//! Room projections and request payloads.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::ToSchema;

use crate::{
    dao::models::{AttachmentEntity, RoomEntity, RoomId},
    dto::{format_system_time, question::QuestionView},
};

/// Metadata of the presentation file attached to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttachmentSummary {
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub size: u64,
}

impl From<&AttachmentEntity> for AttachmentSummary {
    fn from(value: &AttachmentEntity) -> Self {
        Self {
            content_type: value.content_type.clone(),
            file_name: value.file_name.clone(),
            size: value.size,
        }
    }
}

/// Canonical public representation of a room.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomSummary {
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String, example = "7")]
    pub room_id: RoomId,
    /// Four digit join code.
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String, example = "4821")]
    pub code: u16,
    pub title: String,
    pub is_closed: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentSummary>,
}

impl From<&RoomEntity> for RoomSummary {
    fn from(room: &RoomEntity) -> Self {
        Self {
            room_id: room.id,
            code: room.code,
            title: room.title.clone(),
            is_closed: room.is_closed,
            created_at: format_system_time(room.created_at),
            attachment: room.attachment.as_ref().map(AttachmentSummary::from),
        }
    }
}

impl From<RoomEntity> for RoomSummary {
    fn from(room: RoomEntity) -> Self {
        Self::from(&room)
    }
}

/// Response of `GET /rooms`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomListResponse {
    pub count: usize,
    pub rooms: Vec<RoomSummary>,
}

/// Response of `GET /rooms/{room_id}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomDetailResponse {
    pub room: RoomSummary,
    pub questions: Vec<QuestionView>,
    /// Whether the requesting visitor created the room.
    pub is_owner: bool,
}

/// Multipart form accepted by `POST /rooms`. Documentation only.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreateRoomForm {
    pub title: String,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
