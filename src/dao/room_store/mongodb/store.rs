use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::doc,
    error::{
        Error as MongoError, ErrorKind, TRANSIENT_TRANSACTION_ERROR,
        UNKNOWN_TRANSACTION_COMMIT_RESULT, WriteFailure,
    },
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    connection::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{
        COUNTER_COLLECTION_NAME, MongoCounterDocument, MongoQuestionDocument, MongoRoomDocument,
        QUESTION_COLLECTION_NAME, ROOM_COLLECTION_NAME, ROOM_COUNTER_ID, question_key, room_key,
        without_file,
    },
};
use crate::dao::{
    models::{
        LikeDelta, NewRoomEntity, QuestionEntity, QuestionId, RoomEntity, RoomFileEntity, RoomId,
    },
    room_code::RoomCodeSpace,
    room_store::RoomStore,
    storage::{StorageError, StorageResult, normalize_text},
};

const DUPLICATE_KEY_CODE: i32 = 11000;
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// MongoDB-backed [`RoomStore`].
///
/// Question writes run inside multi-document transactions guarded by the
/// room being open, so the deployment must be a replica set or a sharded
/// cluster.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
    codes: RoomCodeSpace,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

/// Question mutation applied under the open-room guard.
#[derive(Debug)]
enum QuestionWrite {
    Text(String),
    Answered(bool),
    Likes(LikeDelta),
    Select,
    Delete,
}

enum WriteOutcome {
    Applied(MongoQuestionDocument),
    RoomMissing,
    RoomClosed,
    QuestionMissing,
    LikesAtZero,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = self.config.connect().await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig, codes: RoomCodeSpace) -> MongoResult<Self> {
        let (client, database) = config.connect().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner, codes };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let rooms = self.database().await.collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME);
        let code_index = IndexModel::builder()
            .keys(doc! {"code": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_code_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        rooms
            .create_index(code_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "code",
                source,
            })?;

        let created_index = IndexModel::builder()
            .keys(doc! {"created_at": 1, "_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_created_idx".to_owned()))
                    .build(),
            )
            .build();
        rooms
            .create_index(created_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "created_at,_id",
                source,
            })?;

        let question_index = IndexModel::builder()
            .keys(doc! {"room_id": 1, "question_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("question_room_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        self.questions()
            .await
            .create_index(question_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUESTION_COLLECTION_NAME,
                index: "room_id,question_id",
                source,
            })?;

        Ok(())
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn questions(&self) -> Collection<MongoQuestionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoQuestionDocument>(QUESTION_COLLECTION_NAME)
    }

    async fn counters(&self) -> Collection<MongoCounterDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoCounterDocument>(COUNTER_COLLECTION_NAME)
    }

    async fn next_room_id(&self) -> MongoResult<RoomId> {
        let counter = self
            .counters()
            .await
            .find_one_and_update(doc! {"_id": ROOM_COUNTER_ID}, doc! {"$inc": {"seq": 1_i64}})
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::AllocateRoomId { source })?
            .ok_or(MongoDaoError::MissingCounter)?;
        Ok(counter.seq)
    }

    async fn create_room(&self, room: NewRoomEntity) -> StorageResult<RoomEntity> {
        let id = self.next_room_id().await?;
        let NewRoomEntity {
            title,
            creator_id,
            file,
        } = room;

        let mut entity = RoomEntity {
            id,
            code: self.codes.sample(),
            title,
            creator_id,
            created_at: SystemTime::now(),
            is_closed: false,
            attachment: file.as_ref().map(RoomFileEntity::attachment),
        };
        let mut document = MongoRoomDocument::from_entity(&entity, file.map(|file| file.bytes));
        let rooms = self.rooms().await;
        let attempts = self.codes.max_attempts();

        for attempt in 1..=attempts {
            match rooms.insert_one(&document).await {
                Ok(_) => return Ok(entity),
                Err(err) if is_duplicate_key(&err) => {
                    debug!(attempt, code = entity.code, "room code already taken; resampling");
                    entity.code = self.codes.sample();
                    document.code = i32::from(entity.code);
                }
                Err(source) => return Err(MongoDaoError::CreateRoom { id, source }.into()),
            }
        }

        Err(StorageError::CodeSpaceExhausted { attempts })
    }

    async fn find_room(&self, id: RoomId) -> StorageResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(room_key(id))
            .projection(without_file())
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;
        Ok(document.map(RoomEntity::try_from).transpose()?)
    }

    async fn get_room(&self, id: RoomId) -> StorageResult<RoomEntity> {
        self.find_room(id)
            .await?
            .ok_or(StorageError::RoomNotFound(id))
    }

    async fn find_room_by_code(&self, code: u16) -> StorageResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc! {"code": i32::from(code)})
            .projection(without_file())
            .await
            .map_err(|source| MongoDaoError::LoadRoomByCode { code, source })?;
        Ok(document.map(RoomEntity::try_from).transpose()?)
    }

    async fn list_rooms(&self) -> StorageResult<Vec<RoomEntity>> {
        let documents: Vec<MongoRoomDocument> = self
            .rooms()
            .await
            .find(doc! {})
            .projection(without_file())
            .sort(doc! {"created_at": 1, "_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?;

        documents
            .into_iter()
            .map(|document| RoomEntity::try_from(document).map_err(Into::into))
            .collect()
    }

    async fn close_room(&self, id: RoomId) -> StorageResult<RoomEntity> {
        let updated = self
            .rooms()
            .await
            .find_one_and_update(
                doc! {"_id": id, "is_closed": false},
                doc! {"$set": {"is_closed": true}},
            )
            .projection(without_file())
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::CloseRoom { id, source })?;

        match updated {
            Some(document) => Ok(RoomEntity::try_from(document)?),
            None => match self.find_room(id).await? {
                Some(_) => Err(StorageError::RoomAlreadyClosed(id)),
                None => Err(StorageError::RoomNotFound(id)),
            },
        }
    }

    async fn room_file(&self, id: RoomId) -> StorageResult<Option<RoomFileEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(room_key(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?
            .ok_or(StorageError::RoomNotFound(id))?;
        Ok(document.into_file())
    }

    async fn create_question(
        &self,
        room_id: RoomId,
        creator_id: String,
        text: String,
    ) -> StorageResult<QuestionEntity> {
        let text = normalize_text(text)?;

        // Allocating the id on an open room refuses closed rooms in the same step.
        let room = self
            .rooms()
            .await
            .find_one_and_update(
                doc! {"_id": room_id, "is_closed": false},
                doc! {"$inc": {"question_seq": 1_i64}},
            )
            .projection(without_file())
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveQuestion { room_id, source })?;

        let Some(room) = room else {
            return match self.find_room(room_id).await? {
                Some(_) => Err(StorageError::RoomClosed(room_id)),
                None => Err(StorageError::RoomNotFound(room_id)),
            };
        };

        let question = QuestionEntity {
            room_id,
            question_id: room.question_seq,
            creator_id,
            created_at: SystemTime::now(),
            text,
            likes: 0,
            is_answered: false,
            is_selected: false,
        };

        self.questions()
            .await
            .insert_one(MongoQuestionDocument::from(&question))
            .await
            .map_err(|source| MongoDaoError::SaveQuestion { room_id, source })?;

        Ok(question)
    }

    async fn list_questions(&self, room_id: RoomId) -> StorageResult<Vec<QuestionEntity>> {
        self.get_room(room_id).await?;

        let documents: Vec<MongoQuestionDocument> = self
            .questions()
            .await
            .find(doc! {"room_id": room_id})
            .sort(doc! {"question_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListQuestions { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListQuestions { room_id, source })?;

        documents
            .into_iter()
            .map(|document| QuestionEntity::try_from(document).map_err(Into::into))
            .collect()
    }

    async fn find_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> StorageResult<Option<QuestionEntity>> {
        let document = self
            .questions()
            .await
            .find_one(question_key(room_id, question_id))
            .await
            .map_err(|source| MongoDaoError::LoadQuestion {
                room_id,
                question_id,
                source,
            })?;
        Ok(document.map(QuestionEntity::try_from).transpose()?)
    }

    /// Run `write` in a transaction guarded by the room still being open.
    async fn write_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        write: QuestionWrite,
    ) -> StorageResult<QuestionEntity> {
        let client = self.client().await;
        let rooms = self.rooms().await;
        let questions = self.questions().await;

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::WriteQuestion {
                room_id,
                question_id,
                attempts: 0,
                source,
            })?;

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            match write_in_transaction(
                &rooms,
                &questions,
                &mut session,
                room_id,
                question_id,
                &write,
            )
            .await
            {
                Ok(outcome) => break outcome,
                Err(err)
                    if err.contains_label(TRANSIENT_TRANSACTION_ERROR)
                        && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    debug!(room_id, question_id, attempt, error = %err, "question write conflicted; retrying");
                    let _ = session.abort_transaction().await;
                }
                Err(source) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        debug!(room_id, error = %abort_err, "failed to abort question write");
                    }
                    warn!(room_id, question_id, attempt, ?write, error = %source, "question write failed");
                    return Err(MongoDaoError::WriteQuestion {
                        room_id,
                        question_id,
                        attempts: attempt,
                        source,
                    }
                    .into());
                }
            }
        };

        match outcome {
            WriteOutcome::Applied(document) => Ok(QuestionEntity::try_from(document)?),
            WriteOutcome::RoomMissing => Err(StorageError::RoomNotFound(room_id)),
            WriteOutcome::RoomClosed => Err(StorageError::RoomClosed(room_id)),
            WriteOutcome::QuestionMissing => Err(StorageError::QuestionNotFound {
                room_id,
                question_id,
            }),
            WriteOutcome::LikesAtZero => Err(StorageError::LikesAtZero {
                room_id,
                question_id,
            }),
        }
    }
}

/// Apply one question write inside a transaction.
///
/// The room document is bumped first, filtered on `is_closed: false`. A close
/// committed earlier makes the guard miss, and concurrent writes on the same
/// room conflict on that document and serialize.
async fn write_in_transaction(
    rooms: &Collection<MongoRoomDocument>,
    questions: &Collection<MongoQuestionDocument>,
    session: &mut ClientSession,
    room_id: RoomId,
    question_id: QuestionId,
    write: &QuestionWrite,
) -> Result<WriteOutcome, MongoError> {
    session.start_transaction().await?;

    let guard = rooms
        .find_one_and_update(
            doc! {"_id": room_id, "is_closed": false},
            doc! {"$inc": {"mutation_seq": 1_i64}},
        )
        .projection(without_file())
        .session(&mut *session)
        .await?;
    if guard.is_none() {
        let exists = rooms
            .find_one(room_key(room_id))
            .projection(without_file())
            .session(&mut *session)
            .await?
            .is_some();
        session.abort_transaction().await?;
        return Ok(if exists {
            WriteOutcome::RoomClosed
        } else {
            WriteOutcome::RoomMissing
        });
    }

    let key = question_key(room_id, question_id);
    let written = match write {
        QuestionWrite::Text(text) => {
            questions
                .find_one_and_update(key, doc! {"$set": {"text": text.as_str()}})
                .return_document(ReturnDocument::After)
                .session(&mut *session)
                .await?
        }
        QuestionWrite::Answered(answered) => {
            questions
                .find_one_and_update(key, doc! {"$set": {"is_answered": *answered}})
                .return_document(ReturnDocument::After)
                .session(&mut *session)
                .await?
        }
        QuestionWrite::Likes(delta) => {
            let mut filter = key;
            if *delta == LikeDelta::Decrement {
                filter.insert("likes", doc! {"$gt": 0_i64});
            }
            questions
                .find_one_and_update(filter, doc! {"$inc": {"likes": delta.as_i64()}})
                .return_document(ReturnDocument::After)
                .session(&mut *session)
                .await?
        }
        QuestionWrite::Select => {
            let target = questions
                .find_one(key.clone())
                .session(&mut *session)
                .await?;
            if target.is_none() {
                session.abort_transaction().await?;
                return Ok(WriteOutcome::QuestionMissing);
            }
            questions
                .update_many(
                    doc! {"room_id": room_id, "is_selected": true},
                    doc! {"$set": {"is_selected": false}},
                )
                .session(&mut *session)
                .await?;
            questions
                .find_one_and_update(key, doc! {"$set": {"is_selected": true}})
                .return_document(ReturnDocument::After)
                .session(&mut *session)
                .await?
        }
        QuestionWrite::Delete => {
            questions
                .find_one_and_delete(key)
                .session(&mut *session)
                .await?
        }
    };

    let Some(document) = written else {
        // Only a decrement filters on more than the key.
        let outcome = if matches!(write, QuestionWrite::Likes(LikeDelta::Decrement))
            && questions
                .find_one(question_key(room_id, question_id))
                .session(&mut *session)
                .await?
                .is_some()
        {
            WriteOutcome::LikesAtZero
        } else {
            WriteOutcome::QuestionMissing
        };
        session.abort_transaction().await?;
        return Ok(outcome);
    };

    commit_with_retry(session).await?;
    Ok(WriteOutcome::Applied(document))
}

async fn commit_with_retry(session: &mut ClientSession) -> Result<(), MongoError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(err)
                if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_COMMIT_ATTEMPTS =>
            {
                debug!(attempt, error = %err, "commit result unknown; retrying commit");
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl RoomStore for MongoRoomStore {
    fn create_room(&self, room: NewRoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move { store.create_room(room).await })
    }

    fn get_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move { store.get_room(id).await })
    }

    fn find_room_by_code(
        &self,
        code: u16,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room_by_code(code).await })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_rooms().await })
    }

    fn close_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move { store.close_room(id).await })
    }

    fn room_file(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomFileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.room_file(id).await })
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
        Box::pin(async move { store.list_questions(room_id).await })
    }

    fn get_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_question(room_id, question_id)
                .await?
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
            let text = normalize_text(text)?;
            store
                .write_question(room_id, question_id, QuestionWrite::Text(text))
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
            store
                .write_question(room_id, question_id, QuestionWrite::Delete)
                .await
        })
    }

    fn adjust_likes(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        delta: LikeDelta,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write_question(room_id, question_id, QuestionWrite::Likes(delta))
                .await
        })
    }

    fn select_question(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write_question(room_id, question_id, QuestionWrite::Select)
                .await
        })
    }

    fn set_answered(
        &self,
        room_id: RoomId,
        question_id: QuestionId,
        answered: bool,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write_question(room_id, question_id, QuestionWrite::Answered(answered))
                .await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
