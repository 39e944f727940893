use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::models::{QuestionId, RoomId};

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Infrastructure failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to allocate the next room id")]
    AllocateRoomId {
        #[source]
        source: MongoError,
    },
    #[error("room id counter was not returned by MongoDB")]
    MissingCounter,
    #[error("failed to create room `{id}`")]
    CreateRoom {
        id: RoomId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{id}`")]
    LoadRoom {
        id: RoomId,
        #[source]
        source: MongoError,
    },
    #[error("failed to look up room code `{code}`")]
    LoadRoomByCode {
        code: u16,
        #[source]
        source: MongoError,
    },
    #[error("failed to list rooms")]
    ListRooms {
        #[source]
        source: MongoError,
    },
    #[error("failed to close room `{id}`")]
    CloseRoom {
        id: RoomId,
        #[source]
        source: MongoError,
    },
    #[error("failed to save question in room `{room_id}`")]
    SaveQuestion {
        room_id: RoomId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load question `{question_id}` in room `{room_id}`")]
    LoadQuestion {
        room_id: RoomId,
        question_id: QuestionId,
        #[source]
        source: MongoError,
    },
    #[error("failed to list questions of room `{room_id}`")]
    ListQuestions {
        room_id: RoomId,
        #[source]
        source: MongoError,
    },
    #[error(
        "write transaction on question `{question_id}` in room `{room_id}` failed after {attempts} attempt(s)"
    )]
    WriteQuestion {
        room_id: RoomId,
        question_id: QuestionId,
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("invalid `{collection}` document: {reason}")]
    InvalidDocument {
        collection: &'static str,
        reason: String,
    },
}
