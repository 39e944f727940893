use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    AttachmentEntity, QuestionEntity, QuestionId, RoomEntity, RoomFileEntity, RoomId,
};

use super::error::MongoDaoError;

pub const ROOM_COLLECTION_NAME: &str = "rooms";
pub const QUESTION_COLLECTION_NAME: &str = "questions";
pub const COUNTER_COLLECTION_NAME: &str = "counters";
pub const ROOM_COUNTER_ID: &str = "rooms";

/// Monotonic sequence stored in the counters collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCounterDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub seq: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAttachment {
    content_type: Option<String>,
    file_name: Option<String>,
    size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    pub id: RoomId,
    pub code: i32,
    pub title: String,
    pub creator_id: String,
    pub created_at: DateTime,
    pub is_closed: bool,
    /// Last question id handed out in this room.
    #[serde(default)]
    pub question_seq: i64,
    /// Bumped by every question write transaction so it conflicts with a concurrent close.
    #[serde(default)]
    pub mutation_seq: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<MongoAttachment>,
    /// Excluded from every read except the download projection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Binary>,
}

impl MongoRoomDocument {
    pub fn from_entity(room: &RoomEntity, file: Option<Vec<u8>>) -> Self {
        Self {
            id: room.id,
            code: i32::from(room.code),
            title: room.title.clone(),
            creator_id: room.creator_id.clone(),
            created_at: DateTime::from_system_time(room.created_at),
            is_closed: room.is_closed,
            question_seq: 0,
            mutation_seq: 0,
            attachment: room.attachment.as_ref().map(|attachment| MongoAttachment {
                content_type: attachment.content_type.clone(),
                file_name: attachment.file_name.clone(),
                size: i64::try_from(attachment.size).unwrap_or(i64::MAX),
            }),
            file: file.map(|bytes| Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            }),
        }
    }

    /// Split the stored bytes off into a download payload.
    pub fn into_file(self) -> Option<RoomFileEntity> {
        let bytes = self.file?.bytes;
        let (content_type, file_name) = self
            .attachment
            .map(|attachment| (attachment.content_type, attachment.file_name))
            .unwrap_or_default();
        Some(RoomFileEntity {
            bytes,
            content_type,
            file_name,
        })
    }
}

impl TryFrom<MongoRoomDocument> for RoomEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRoomDocument) -> Result<Self, Self::Error> {
        let code = u16::try_from(value.code).map_err(|_| MongoDaoError::InvalidDocument {
            collection: ROOM_COLLECTION_NAME,
            reason: format!("room `{}` has out of range code {}", value.id, value.code),
        })?;

        Ok(Self {
            id: value.id,
            code,
            title: value.title,
            creator_id: value.creator_id,
            created_at: value.created_at.to_system_time(),
            is_closed: value.is_closed,
            attachment: value.attachment.map(|attachment| AttachmentEntity {
                content_type: attachment.content_type,
                file_name: attachment.file_name,
                size: u64::try_from(attachment.size).unwrap_or_default(),
            }),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    pub room_id: RoomId,
    pub question_id: QuestionId,
    pub creator_id: String,
    pub created_at: DateTime,
    pub text: String,
    pub likes: i64,
    pub is_answered: bool,
    pub is_selected: bool,
}

impl From<&QuestionEntity> for MongoQuestionDocument {
    fn from(value: &QuestionEntity) -> Self {
        Self {
            room_id: value.room_id,
            question_id: value.question_id,
            creator_id: value.creator_id.clone(),
            created_at: DateTime::from_system_time(value.created_at),
            text: value.text.clone(),
            likes: i64::try_from(value.likes).unwrap_or(i64::MAX),
            is_answered: value.is_answered,
            is_selected: value.is_selected,
        }
    }
}

impl TryFrom<MongoQuestionDocument> for QuestionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuestionDocument) -> Result<Self, Self::Error> {
        let likes = u64::try_from(value.likes).map_err(|_| MongoDaoError::InvalidDocument {
            collection: QUESTION_COLLECTION_NAME,
            reason: format!(
                "question `{}` in room `{}` has negative likes {}",
                value.question_id, value.room_id, value.likes
            ),
        })?;

        Ok(Self {
            room_id: value.room_id,
            question_id: value.question_id,
            creator_id: value.creator_id,
            created_at: value.created_at.to_system_time(),
            text: value.text,
            likes,
            is_answered: value.is_answered,
            is_selected: value.is_selected,
        })
    }
}

pub fn room_key(id: RoomId) -> Document {
    doc! {"_id": id}
}

pub fn question_key(room_id: RoomId, question_id: QuestionId) -> Document {
    doc! {"room_id": room_id, "question_id": question_id}
}

/// Projection that keeps attachment bytes out of regular room reads.
pub fn without_file() -> Document {
    doc! {"file": 0}
}
