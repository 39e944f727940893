use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;

use crate::dao::{
    models::{
        LikeDelta, NewRoomEntity, QuestionEntity, QuestionId, RoomEntity, RoomFileEntity, RoomId,
    },
    room_store::{RoomStore, memory::MemoryRoomStore},
    storage::{StorageError, StorageResult},
};

/// In-memory store with switchable interference, used to reproduce
/// interleavings that are hard to hit with real concurrency.
#[derive(Clone, Default)]
pub struct InterferingRoomStore {
    inner: MemoryRoomStore,
    close_after_next_read: Arc<AtomicBool>,
    fail_question_listing: Arc<AtomicBool>,
}

impl InterferingRoomStore {
    /// The next `get_room` returns the room as open, then closes it before
    /// the caller gets to write.
    pub fn close_after_next_read(&self) {
        self.close_after_next_read.store(true, Ordering::SeqCst);
    }

    pub fn fail_question_listing(&self, fail: bool) {
        self.fail_question_listing.store(fail, Ordering::SeqCst);
    }
}

impl RoomStore for InterferingRoomStore {
    fn create_room(&self, room: NewRoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        RoomStore::create_room(&self.inner, room)
    }

    fn get_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let room = RoomStore::get_room(&store.inner, id).await?;
            if store.close_after_next_read.swap(false, Ordering::SeqCst) {
                RoomStore::close_room(&store.inner, id).await?;
            }
            Ok(room)
        })
    }

    fn find_room_by_code(
        &self,
        code: u16,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        RoomStore::find_room_by_code(&self.inner, code)
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        RoomStore::list_rooms(&self.inner)
    }

    fn close_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        RoomStore::close_room(&self.inner, id)
    }

    fn room_file(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomFileEntity>>> {
        RoomStore::room_file(&self.inner, id)
    }

    fn create_question(
        &self,
        room_id: RoomId,
        creator_id: String,
        text: String,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        RoomStore::create_question(&self.inner, room_id, creator_id, text)
    }

    fn list_questions(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        if self.fail_question_listing.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err(StorageError::unavailable(
                    "question listing failed".into(),
                    io::Error::other("connection reset"),
                ))
            });
        }
        RoomStore::list_questions(&self.inner, room_id)
    }

    fn get_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        RoomStore::get_question(&self.inner, room_id, question_id)
    }

    fn update_question_text(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        text: String,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        RoomStore::update_question_text(&self.inner, room_id, question_id, text)
    }

    fn delete_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        RoomStore::delete_question(&self.inner, room_id, question_id)
    }

    fn adjust_likes(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        delta: LikeDelta,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        RoomStore::adjust_likes(&self.inner, room_id, question_id, delta)
    }

    fn select_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        RoomStore::select_question(&self.inner, room_id, question_id)
    }

    fn set_answered(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        answered: bool,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        RoomStore::set_answered(&self.inner, room_id, question_id, answered)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        RoomStore::health_check(&self.inner)
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        RoomStore::try_reconnect(&self.inner)
    }
}
