use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dao::models::RoomId,
    dto::events::RoomEvent,
    error::ServiceError,
    services::{room_events, room_service},
    state::{Connection, SharedState},
};

/// Live subscription of one SSE client to a room.
pub struct RoomSubscription {
    connection: Connection,
    receiver: mpsc::UnboundedReceiver<RoomEvent>,
    room_id: RoomId,
}

/// Join `room_id` and queue the current room snapshot as the first event.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: RoomId,
) -> Result<RoomSubscription, ServiceError> {
    let room = room_service::get_room(state, room_id).await?;
    let (connection, receiver) = Connection::open();
    state.hub().join(&connection, room_id);

    let store = state.require_room_store().await?;
    let questions = match state
        .store_call("list_questions", store.list_questions(room_id))
        .await
    {
        Ok(questions) => questions,
        Err(err) => {
            state.hub().disconnect(connection.id);
            return Err(err);
        }
    };

    match room_events::room_snapshot(&room, &questions) {
        Ok(snapshot) => {
            let _ = connection.tx.send(snapshot);
        }
        Err(err) => warn!(room_id, error = %err, "failed to serialise room snapshot"),
    }

    Ok(RoomSubscription {
        connection,
        receiver,
        room_id,
    })
}

/// Convert a room subscription into an SSE response, forwarding events and
/// leaving the room once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    subscription: RoomSubscription,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let RoomSubscription {
        connection,
        mut receiver,
        room_id,
    } = subscription;
    let connection_id = connection.id;
    // Only the hub keeps a sender, so the stream ends when the room is left or the hub shuts down.
    drop(connection);

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                received = receiver.recv() => {
                    let Some(room_event) = received else {
                        break;
                    };
                    let event = Event::default()
                        .event(room_event.event)
                        .data(room_event.data.to_string());
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        state.hub().disconnect(connection_id);
        info!(connection = %connection_id, room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}
