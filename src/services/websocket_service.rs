use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dao::models::{RoomEntity, RoomId},
    dto::{
        events::{GatewayErrorEvent, RoomEvent},
        ws::ClientMessage,
    },
    error::ServiceError,
    services::{room_events, room_service},
    state::{Connection, SharedState},
};

/// Failures while serving a single inbound WebSocket message.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    #[error("failed to serialise event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle for an observer WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (connection, mut events_rx) = Connection::open();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(message) = outbound_rx.recv() => message,
                Some(event) = events_rx.recv() => match serde_json::to_string(&event) {
                    Ok(payload) => Message::Text(payload.into()),
                    Err(err) => {
                        warn!(event = event.event, error = %err, "failed to serialise room event");
                        continue;
                    }
                },
                else => break,
            };

            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!(connection = %connection.id, "websocket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection = %connection.id, payload = %text.as_str(), "received websocket message");
                match ClientMessage::from_json_str(text.as_str()) {
                    Ok(ClientMessage::JoinRoom { room_id }) => {
                        if let Err(err) = join_room(&state, &connection, room_id).await {
                            if matches!(err, SocketError::ConnectionClosed) {
                                break;
                            }
                            warn!(connection = %connection.id, room_id, error = %err, "join rejected");
                            if reply_error(&connection, err.to_string()).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(ClientMessage::LeaveRoom { room_id }) => {
                        if state.hub().leave(connection.id, room_id) {
                            info!(connection = %connection.id, room_id, "left room");
                        }
                    }
                    Ok(ClientMessage::Unknown) => {
                        warn!(connection = %connection.id, "ignoring unknown websocket message type");
                    }
                    Err(err) => {
                        warn!(connection = %connection.id, error = %err, "failed to parse websocket message");
                        if reply_error(&connection, format!("malformed message: {err}")).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection.id, error = %err, "websocket error");
                break;
            }
        }
    }

    let left = state.hub().disconnect(connection.id);
    info!(connection = %connection.id, rooms = left, "websocket disconnected");

    drop(connection);
    finalize(writer_task, outbound_tx).await;
}

/// Subscribe the connection to a room and send it the current room state.
///
/// A membership created here is dropped again when the snapshot cannot be
/// produced, so a failed join never leaves the connection receiving events.
async fn join_room(
    state: &SharedState,
    connection: &Connection,
    room_id: RoomId,
) -> Result<(), SocketError> {
    let room = room_service::get_room(state, room_id).await?;

    let joined = state.hub().join(connection, room_id);
    if joined {
        info!(connection = %connection.id, room_id, "joined room");
    }

    // Loaded after joining so no accepted change falls between snapshot and stream.
    let snapshot = match load_snapshot(state, &room).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            if joined {
                state.hub().leave(connection.id, room_id);
            }
            return Err(err);
        }
    };

    connection
        .tx
        .send(snapshot)
        .map_err(|_| SocketError::ConnectionClosed)
}

async fn load_snapshot(state: &SharedState, room: &RoomEntity) -> Result<RoomEvent, SocketError> {
    let store = state.require_room_store().await?;
    let questions = state
        .store_call("list_questions", store.list_questions(room.id))
        .await?;
    Ok(room_events::room_snapshot(room, &questions)?)
}

fn reply_error(connection: &Connection, message: String) -> Result<(), SocketError> {
    let event = RoomEvent::json(room_events::EVENT_ERROR, &GatewayErrorEvent { message })?;
    connection
        .tx
        .send(event)
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::testing::InterferingRoomStore,
        services::room_events::EVENT_ROOM_SNAPSHOT,
        state::AppState,
    };

    async fn state_with(store: InterferingRoomStore) -> SharedState {
        let mut config = AppConfig::default();
        config.rooms.require_file = false;
        let state = AppState::new(config);
        state.install_room_store(Arc::new(store)).await;
        state
    }

    #[tokio::test]
    async fn join_sends_the_snapshot_first() {
        let state = state_with(InterferingRoomStore::default()).await;
        let room = room_service::create_room(&state, "presenter", "Talk", None)
            .await
            .unwrap();
        let (connection, mut rx) = Connection::open();

        join_room(&state, &connection, room.id).await.unwrap();

        assert!(state.hub().is_joined(connection.id, room.id));
        assert_eq!(rx.try_recv().unwrap().event, EVENT_ROOM_SNAPSHOT);
    }

    #[tokio::test]
    async fn failed_snapshot_undoes_the_join() {
        let store = InterferingRoomStore::default();
        let state = state_with(store.clone()).await;
        let room = room_service::create_room(&state, "presenter", "Talk", None)
            .await
            .unwrap();
        let (connection, mut rx) = Connection::open();
        store.fail_question_listing(true);

        let err = join_room(&state, &connection, room.id).await.unwrap_err();

        assert!(matches!(err, SocketError::Service(ServiceError::Unavailable(_))));
        assert!(!state.hub().is_joined(connection.id, room.id));
        assert_eq!(state.hub().subscriber_count(room.id), 0);
        room_events::broadcast_room_closed(&state, &room);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_rejoin_keeps_the_existing_membership() {
        let store = InterferingRoomStore::default();
        let state = state_with(store.clone()).await;
        let room = room_service::create_room(&state, "presenter", "Talk", None)
            .await
            .unwrap();
        let (connection, _rx) = Connection::open();
        join_room(&state, &connection, room.id).await.unwrap();
        store.fail_question_listing(true);

        assert!(join_room(&state, &connection, room.id).await.is_err());
        assert!(state.hub().is_joined(connection.id, room.id));
    }
}
