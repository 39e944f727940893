pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
#[cfg(test)]
pub mod testing;

use futures::future::BoxFuture;

use crate::dao::models::{
    LikeDelta, NewRoomEntity, QuestionEntity, QuestionId, RoomEntity, RoomFileEntity, RoomId,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for rooms and their questions.
///
/// Implementations own the cross-row invariants: join code uniqueness, the
/// per-room question sequence, atomic like counters that never go below zero
/// and the single selected question per room.
pub trait RoomStore: Send + Sync {
    fn create_room(&self, room: NewRoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>>;
    fn get_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>>;
    fn find_room_by_code(&self, code: u16)
    -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Rooms ordered by creation time, oldest first.
    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>>;
    fn close_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>>;
    fn room_file(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomFileEntity>>>;

    fn create_question(
        &self,
        room_id: RoomId,
        creator_id: String,
        text: String,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    /// Questions of a room ordered by question id.
    fn list_questions(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    fn get_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    fn update_question_text(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        text: String,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    /// Remove a question, returning the deleted row.
    fn delete_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    /// Atomically apply `delta` to the like counter.
    fn adjust_likes(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        delta: LikeDelta,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    /// Clear the selection of every question in the room and select the
    /// target, as one indivisible step.
    fn select_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    fn set_answered(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        answered: bool,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
