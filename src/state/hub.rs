use std::{
    collections::HashSet,
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{dao::models::RoomId, dto::events::RoomEvent};

/// Identifier of a realtime connection (one WebSocket or SSE stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Clone)]
/// Handle used to push events to a connected observer.
pub struct Connection {
    pub id: ConnectionId,
    pub tx: mpsc::UnboundedSender<RoomEvent>,
}

impl Connection {
    /// Create a connection along with the receiving half its writer drains.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }
}

/// Per-room publish/subscribe registry.
///
/// Delivery is best effort: an event reaches whoever is joined at the time of
/// [`RoomHub::publish`], closed receivers are pruned on the way and nothing is
/// retried or persisted. Events published to one room keep their order on
/// every connection because publishing holds the room entry while it sends.
pub struct RoomHub {
    rooms: DashMap<RoomId, IndexMap<ConnectionId, mpsc::UnboundedSender<RoomEvent>>>,
    memberships: DashMap<ConnectionId, HashSet<RoomId>>,
    closed: AtomicBool,
}

impl RoomHub {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe `connection` to `room_id`.
    ///
    /// Returns `false` when the connection was already joined or the hub is shut down.
    pub fn join(&self, connection: &Connection, room_id: RoomId) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        let inserted = {
            let mut subscribers = self.rooms.entry(room_id).or_default();
            if subscribers.contains_key(&connection.id) {
                false
            } else {
                subscribers.insert(connection.id, connection.tx.clone());
                true
            }
        };

        self.memberships
            .entry(connection.id)
            .or_default()
            .insert(room_id);

        if inserted {
            debug!(connection = %connection.id, room_id, "connection joined room");
        }
        inserted
    }

    /// Unsubscribe a connection from a single room.
    pub fn leave(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let removed = self.remove_subscriber(room_id, connection_id);

        if let Some(mut rooms) = self.memberships.get_mut(&connection_id) {
            rooms.remove(&room_id);
        }
        self.memberships
            .remove_if(&connection_id, |_, rooms| rooms.is_empty());

        if removed {
            debug!(connection = %connection_id, room_id, "connection left room");
        }
        removed
    }

    /// Drop every subscription held by a connection, returning how many rooms it left.
    pub fn disconnect(&self, connection_id: ConnectionId) -> usize {
        let Some((_, rooms)) = self.memberships.remove(&connection_id) else {
            return 0;
        };

        rooms
            .into_iter()
            .filter(|room_id| self.remove_subscriber(*room_id, connection_id))
            .count()
    }

    /// Deliver `event` to every connection joined to `room_id`.
    ///
    /// Returns the number of connections the event was handed to.
    pub fn publish(&self, room_id: RoomId, event: &RoomEvent) -> usize {
        let mut dead = Vec::new();
        let delivered = {
            let Some(mut subscribers) = self.rooms.get_mut(&room_id) else {
                return 0;
            };

            let mut delivered = 0;
            subscribers.retain(|connection_id, tx| {
                if tx.send(event.clone()).is_ok() {
                    delivered += 1;
                    true
                } else {
                    dead.push(*connection_id);
                    false
                }
            });
            delivered
        };

        if !dead.is_empty() {
            self.rooms
                .remove_if(&room_id, |_, subscribers| subscribers.is_empty());
            for connection_id in dead {
                debug!(connection = %connection_id, room_id, "pruned closed connection");
                if let Some(mut rooms) = self.memberships.get_mut(&connection_id) {
                    rooms.remove(&room_id);
                }
                self.memberships
                    .remove_if(&connection_id, |_, rooms| rooms.is_empty());
            }
        }

        delivered
    }

    /// Number of connections currently joined to `room_id`.
    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .get(&room_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    pub fn is_joined(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        self.rooms
            .get(&room_id)
            .is_some_and(|subscribers| subscribers.contains_key(&connection_id))
    }

    /// Drop every subscription so connection writers observe their channel closing.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.rooms.clear();
        self.memberships.clear();
    }

    fn remove_subscriber(&self, room_id: RoomId, connection_id: ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(&room_id) {
            Some(mut subscribers) => subscribers.shift_remove(&connection_id).is_some(),
            None => false,
        };
        if removed {
            self.rooms
                .remove_if(&room_id, |_, subscribers| subscribers.is_empty());
        }
        removed
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(name: &'static str) -> RoomEvent {
        RoomEvent::new(name, json!({ "question_id": "1" }))
    }

    #[test]
    fn join_is_idempotent() {
        let hub = RoomHub::new();
        let (connection, _rx) = Connection::open();

        assert!(hub.join(&connection, 1));
        assert!(!hub.join(&connection, 1));
        assert_eq!(hub.subscriber_count(1), 1);
    }

    #[test]
    fn publish_reaches_each_joined_connection_once() {
        let hub = RoomHub::new();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (connection, rx) = Connection::open();
            hub.join(&connection, 7);
            hub.join(&connection, 7);
            receivers.push(rx);
        }

        assert_eq!(hub.publish(7, &event("newQuestion")), 5);

        for rx in receivers.iter_mut() {
            let received = rx.try_recv().expect("event delivered");
            assert_eq!(received.event, "newQuestion");
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn publish_does_not_leak_to_other_rooms() {
        let hub = RoomHub::new();
        let (in_room, mut in_rx) = Connection::open();
        let (elsewhere, mut elsewhere_rx) = Connection::open();
        hub.join(&in_room, 1);
        hub.join(&elsewhere, 2);

        assert_eq!(hub.publish(1, &event("updateLikes")), 1);
        assert!(in_rx.try_recv().is_ok());
        assert!(elsewhere_rx.try_recv().is_err());
        assert_eq!(hub.publish(3, &event("updateLikes")), 0);
    }

    #[test]
    fn leave_stops_delivery_for_that_room_only() {
        let hub = RoomHub::new();
        let (connection, mut rx) = Connection::open();
        hub.join(&connection, 1);
        hub.join(&connection, 2);

        assert!(hub.leave(connection.id, 1));
        assert!(!hub.leave(connection.id, 1));

        assert_eq!(hub.publish(1, &event("newQuestion")), 0);
        assert_eq!(hub.publish(2, &event("newQuestion")), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn disconnect_leaves_every_room() {
        let hub = RoomHub::new();
        let (connection, _rx) = Connection::open();
        hub.join(&connection, 1);
        hub.join(&connection, 2);

        assert_eq!(hub.disconnect(connection.id), 2);
        assert_eq!(hub.subscriber_count(1), 0);
        assert_eq!(hub.subscriber_count(2), 0);
        assert_eq!(hub.disconnect(connection.id), 0);
    }

    #[test]
    fn publish_prunes_closed_receivers() {
        let hub = RoomHub::new();
        let (alive, mut alive_rx) = Connection::open();
        let (gone, gone_rx) = Connection::open();
        hub.join(&alive, 4);
        hub.join(&gone, 4);
        drop(gone_rx);

        assert_eq!(hub.publish(4, &event("receiveHighlight")), 1);
        assert_eq!(hub.subscriber_count(4), 1);
        assert!(!hub.is_joined(gone.id, 4));
        assert!(alive_rx.try_recv().is_ok());
    }

    #[test]
    fn events_keep_publish_order() {
        let hub = RoomHub::new();
        let (connection, mut rx) = Connection::open();
        hub.join(&connection, 9);

        for name in ["newQuestion", "updateLikes", "receiveHighlight", "deleteQuestion"] {
            hub.publish(9, &event(name));
        }

        let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.event)
            .collect();
        assert_eq!(
            received,
            vec!["newQuestion", "updateLikes", "receiveHighlight", "deleteQuestion"]
        );
    }

    #[tokio::test]
    async fn shutdown_closes_writer_channels() {
        let hub = RoomHub::new();
        let (connection, mut rx) = Connection::open();
        hub.join(&connection, 1);
        let Connection { tx, .. } = connection.clone();
        drop(connection);
        drop(tx);

        hub.shutdown();

        assert!(rx.recv().await.is_none());
        let (late, _late_rx) = Connection::open();
        assert!(!hub.join(&late, 1));
    }
}
