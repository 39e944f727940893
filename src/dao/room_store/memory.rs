//! In-process [`RoomStore`] used when no database is configured and by tests.
//!
//! Every operation runs inside a single write-lock critical section, which
//! makes counter updates and selection changes atomic with respect to each
//! other.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
    time::SystemTime,
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    models::{
        LikeDelta, NewRoomEntity, QuestionEntity, QuestionId, RoomEntity, RoomFileEntity, RoomId,
    },
    room_code::RoomCodeSpace,
    room_store::RoomStore,
    storage::{StorageError, StorageResult, normalize_text},
};

#[derive(Clone)]
pub struct MemoryRoomStore {
    inner: Arc<RwLock<MemoryState>>,
    codes: RoomCodeSpace,
}

#[derive(Default)]
struct MemoryState {
    next_room_id: RoomId,
    rooms: BTreeMap<RoomId, StoredRoom>,
    used_codes: HashSet<u16>,
}

struct StoredRoom {
    room: RoomEntity,
    file: Option<RoomFileEntity>,
    next_question_id: QuestionId,
    questions: BTreeMap<QuestionId, QuestionEntity>,
}

impl MemoryState {
    fn room(&self, id: RoomId) -> StorageResult<&StoredRoom> {
        self.rooms.get(&id).ok_or(StorageError::RoomNotFound(id))
    }

    fn room_mut(&mut self, id: RoomId) -> StorageResult<&mut StoredRoom> {
        self.rooms.get_mut(&id).ok_or(StorageError::RoomNotFound(id))
    }

    /// Room that still accepts question writes.
    fn open_room_mut(&mut self, id: RoomId) -> StorageResult<&mut StoredRoom> {
        let stored = self.room_mut(id)?;
        if stored.room.is_closed {
            return Err(StorageError::RoomClosed(id));
        }
        Ok(stored)
    }

    fn open_question_mut(
        &mut self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> StorageResult<&mut QuestionEntity> {
        self.open_room_mut(room_id)?
            .questions
            .get_mut(&question_id)
            .ok_or(StorageError::QuestionNotFound {
                room_id,
                question_id,
            })
    }
}

impl MemoryRoomStore {
    pub fn new(codes: RoomCodeSpace) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryState::default())),
            codes,
        }
    }

    async fn create_room(&self, room: NewRoomEntity) -> StorageResult<RoomEntity> {
        let mut state = self.inner.write().await;

        let code = self.allocate_code(&state.used_codes)?;
        state.next_room_id += 1;
        let id = state.next_room_id;

        let entity = RoomEntity {
            id,
            code,
            title: room.title,
            creator_id: room.creator_id,
            created_at: SystemTime::now(),
            is_closed: false,
            attachment: room.file.as_ref().map(RoomFileEntity::attachment),
        };

        state.used_codes.insert(code);
        state.rooms.insert(
            id,
            StoredRoom {
                room: entity.clone(),
                file: room.file,
                next_question_id: 0,
                questions: BTreeMap::new(),
            },
        );
        Ok(entity)
    }

    fn allocate_code(&self, used: &HashSet<u16>) -> StorageResult<u16> {
        let attempts = self.codes.max_attempts();
        if used.len() >= self.codes.capacity() {
            return Err(StorageError::CodeSpaceExhausted { attempts: 0 });
        }

        (0..attempts)
            .map(|_| self.codes.sample())
            .find(|candidate| !used.contains(candidate))
            .ok_or(StorageError::CodeSpaceExhausted { attempts })
    }

    async fn list_rooms(&self) -> Vec<RoomEntity> {
        let state = self.inner.read().await;
        let mut rooms: Vec<RoomEntity> = state
            .rooms
            .values()
            .map(|stored| stored.room.clone())
            .collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rooms
    }

    async fn close_room(&self, id: RoomId) -> StorageResult<RoomEntity> {
        let mut state = self.inner.write().await;
        let stored = state.room_mut(id)?;
        if stored.room.is_closed {
            return Err(StorageError::RoomAlreadyClosed(id));
        }
        stored.room.is_closed = true;
        Ok(stored.room.clone())
    }

    async fn create_question(
        &self,
        room_id: RoomId,
        creator_id: String,
        text: String,
    ) -> StorageResult<QuestionEntity> {
        let text = normalize_text(text)?;
        let mut state = self.inner.write().await;
        let stored = state.open_room_mut(room_id)?;
        stored.next_question_id += 1;
        let question = QuestionEntity {
            room_id,
            question_id: stored.next_question_id,
            creator_id,
            created_at: SystemTime::now(),
            text,
            likes: 0,
            is_answered: false,
            is_selected: false,
        };
        stored
            .questions
            .insert(question.question_id, question.clone());
        Ok(question)
    }

    async fn update_question_text(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        text: String,
    ) -> StorageResult<QuestionEntity> {
        let text = normalize_text(text)?;
        let mut state = self.inner.write().await;
        let question = state.open_question_mut(room_id, question_id)?;
        question.text = text;
        Ok(question.clone())
    }

    async fn adjust_likes(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        delta: LikeDelta,
    ) -> StorageResult<QuestionEntity> {
        let mut state = self.inner.write().await;
        let question = state.open_question_mut(room_id, question_id)?;
        question.likes = match delta {
            LikeDelta::Increment => question.likes + 1,
            LikeDelta::Decrement => {
                question
                    .likes
                    .checked_sub(1)
                    .ok_or(StorageError::LikesAtZero {
                        room_id,
                        question_id,
                    })?
            }
        };
        Ok(question.clone())
    }

    async fn select_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> StorageResult<QuestionEntity> {
        let mut state = self.inner.write().await;
        let stored = state.open_room_mut(room_id)?;
        if !stored.questions.contains_key(&question_id) {
            return Err(StorageError::QuestionNotFound {
                room_id,
                question_id,
            });
        }

        for (id, question) in stored.questions.iter_mut() {
            question.is_selected = *id == question_id;
        }

        stored
            .questions
            .get(&question_id)
            .cloned()
            .ok_or(StorageError::QuestionNotFound {
                room_id,
                question_id,
            })
    }
}

impl Default for MemoryRoomStore {
    fn default() -> Self {
        Self::new(RoomCodeSpace::default())
    }
}

impl RoomStore for MemoryRoomStore {
    fn create_room(&self, room: NewRoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move { store.create_room(room).await })
    }

    fn get_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.inner.read().await;
            state.room(id).map(|stored| stored.room.clone())
        })
    }

    fn find_room_by_code(
        &self,
        code: u16,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.inner.read().await;
            Ok(state
                .rooms
                .values()
                .find(|stored| stored.room.code == code)
                .map(|stored| stored.room.clone()))
        })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list_rooms().await) })
    }

    fn close_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move { store.close_room(id).await })
    }

    fn room_file(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomFileEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.inner.read().await;
            state.room(id).map(|stored| stored.file.clone())
        })
    }

    fn create_question(
        &self,
        room_id: RoomId,
        creator_id: String,
        text: String,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move { store.create_question(room_id, creator_id, text).await })
    }

    fn list_questions(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.inner.read().await;
            state
                .room(room_id)
                .map(|stored| stored.questions.values().cloned().collect())
        })
    }

    fn get_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.inner.read().await;
            state
                .rooms
                .get(&room_id)
                .and_then(|stored| stored.questions.get(&question_id))
                .cloned()
                .ok_or(StorageError::QuestionNotFound {
                    room_id,
                    question_id,
                })
        })
    }

    fn update_question_text(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        text: String,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_question_text(room_id, question_id, text)
                .await
        })
    }

    fn delete_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let mut state = store.inner.write().await;
            state
                .open_room_mut(room_id)?
                .questions
                .remove(&question_id)
                .ok_or(StorageError::QuestionNotFound {
                    room_id,
                    question_id,
                })
        })
    }

    fn adjust_likes(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        delta: LikeDelta,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move { store.adjust_likes(room_id, question_id, delta).await })
    }

    fn select_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move { store.select_question(room_id, question_id).await })
    }

    fn set_answered(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        answered: bool,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let mut state = store.inner.write().await;
            let question = state.open_question_mut(room_id, question_id)?;
            question.is_answered = answered;
            Ok(question.clone())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
