use serde::Serialize;
use serde_json::Value;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::ToSchema;

use crate::{
    dao::models::QuestionId,
    dto::{question::QuestionSummary, room::RoomSummary},
};

#[derive(Clone, Debug, Serialize)]
/// Named fact fanned out to every observer of a room.
///
/// Serializes as the `{"event": ..., "data": ...}` envelope used on WebSockets;
/// SSE streams use `event` as the event name and `data` as the payload.
pub struct RoomEvent {
    pub event: &'static str,
    pub data: Value,
}

impl RoomEvent {
    pub fn new(event: &'static str, data: Value) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &'static str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event,
            data: serde_json::to_value(payload)?,
        })
    }
}

#[serde_as]
#[derive(Debug, Serialize, ToSchema)]
/// Payload of `deleteQuestion` and `receiveHighlight`.
pub struct QuestionRefEvent {
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub question_id: QuestionId,
}

#[serde_as]
#[derive(Debug, Serialize, ToSchema)]
/// Payload of `updateLikes`.
pub struct LikesEvent {
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub question_id: QuestionId,
    pub likes: u64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
/// Payload of `roomClosed`.
pub struct RoomClosedEvent {}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to a single connection right after it joins a room.
pub struct RoomSnapshotEvent {
    pub room: RoomSummary,
    pub questions: Vec<QuestionSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to a single connection when one of its messages is rejected.
pub struct GatewayErrorEvent {
    pub message: String,
}
