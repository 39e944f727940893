use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Internal identifier of a room.
pub type RoomId = i64;
/// Identifier of a question, unique only within its room.
pub type QuestionId = i64;

/// Metadata describing the presentation asset attached to a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentEntity {
    /// MIME type supplied at upload time.
    pub content_type: Option<String>,
    /// Original file name supplied at upload time.
    pub file_name: Option<String>,
    /// Size of the stored payload in bytes.
    pub size: u64,
}

/// Uploaded presentation asset, bytes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomFileEntity {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl RoomFileEntity {
    /// Metadata projection stored alongside the room.
    pub fn attachment(&self) -> AttachmentEntity {
        AttachmentEntity {
            content_type: self.content_type.clone(),
            file_name: self.file_name.clone(),
            size: self.bytes.len() as u64,
        }
    }
}

/// Room as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: RoomId,
    /// Four digit join code shared with the audience.
    pub code: u16,
    /// Title of the talk or session.
    pub title: String,
    /// Visitor identifier of the presenter who opened the room.
    pub creator_id: String,
    /// Creation timestamp, used to order room listings.
    pub created_at: SystemTime,
    /// Once set the room never reopens.
    pub is_closed: bool,
    /// Attachment metadata; the bytes are fetched separately.
    pub attachment: Option<AttachmentEntity>,
}

/// Input accepted by [`crate::dao::room_store::RoomStore::create_room`].
#[derive(Debug, Clone)]
pub struct NewRoomEntity {
    pub title: String,
    pub creator_id: String,
    pub file: Option<RoomFileEntity>,
}

/// Question as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Room owning the question.
    pub room_id: RoomId,
    /// Per-room sequence number.
    pub question_id: QuestionId,
    /// Visitor identifier of the author.
    pub creator_id: String,
    pub created_at: SystemTime,
    /// Trimmed, non-empty question text.
    pub text: String,
    /// Like counter, never negative.
    pub likes: u64,
    /// Set by the presenter once the question was addressed.
    pub is_answered: bool,
    /// Spotlight flag, held by at most one question per room.
    pub is_selected: bool,
}

/// Single step applied to a like counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeDelta {
    Increment,
    Decrement,
}

impl LikeDelta {
    /// Signed value of the step.
    pub fn as_i64(self) -> i64 {
        match self {
            LikeDelta::Increment => 1,
            LikeDelta::Decrement => -1,
        }
    }
}
