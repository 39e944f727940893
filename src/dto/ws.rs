use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use utoipa::ToSchema;

use crate::dao::models::RoomId;

#[serde_as]
#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "joinRoom")]
    JoinRoom {
        #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
        #[schema(value_type = String)]
        room_id: RoomId,
    },
    #[serde(rename = "leaveRoom")]
    LeaveRoom {
        #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
        #[schema(value_type = String)]
        room_id: RoomId,
    },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_with_string_or_numeric_room() {
        let quoted = ClientMessage::from_json_str(r#"{"type":"joinRoom","room_id":"7"}"#).unwrap();
        let bare = ClientMessage::from_json_str(r#"{"type":"joinRoom","room_id":7}"#).unwrap();

        assert!(matches!(quoted, ClientMessage::JoinRoom { room_id: 7 }));
        assert!(matches!(bare, ClientMessage::JoinRoom { room_id: 7 }));
    }

    #[test]
    fn parses_leave_and_unknown() {
        let leave = ClientMessage::from_json_str(r#"{"type":"leaveRoom","room_id":"2"}"#).unwrap();
        let other = ClientMessage::from_json_str(r#"{"type":"dance"}"#).unwrap();

        assert!(matches!(leave, ClientMessage::LeaveRoom { room_id: 2 }));
        assert!(matches!(other, ClientMessage::Unknown));
    }

    #[test]
    fn rejects_malformed_room_id() {
        assert!(ClientMessage::from_json_str(r#"{"type":"joinRoom","room_id":"abc"}"#).is_err());
        assert!(ClientMessage::from_json_str("not json").is_err());
    }
}
