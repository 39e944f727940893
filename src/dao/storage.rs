use std::error::Error;
use thiserror::Error;

use crate::dao::models::{QuestionId, RoomId};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("room `{0}` not found")]
    RoomNotFound(RoomId),
    #[error("question `{question_id}` not found in room `{room_id}`")]
    QuestionNotFound {
        room_id: RoomId,
        question_id: QuestionId,
    },
    #[error("room `{0}` is closed")]
    RoomClosed(RoomId),
    #[error("room `{0}` is already closed")]
    RoomAlreadyClosed(RoomId),
    #[error("no free room code found after {attempts} attempt(s)")]
    CodeSpaceExhausted { attempts: u32 },
    #[error("question text must not be empty")]
    EmptyText,
    #[error("question `{question_id}` in room `{room_id}` has no likes to remove")]
    LikesAtZero {
        room_id: RoomId,
        question_id: QuestionId,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Trim question text, rejecting input that is blank once trimmed.
pub fn normalize_text(text: String) -> StorageResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StorageError::EmptyText);
    }
    Ok(trimmed.to_owned())
}
