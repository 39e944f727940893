use thiserror::Error;

use crate::dao::models::{RoomEntity, RoomId};

/// Lifecycle of a room. Transitions only go from `Open` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Open,
    Closed,
}

/// Rejected room lifecycle request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomPhaseError {
    #[error("room `{0}` is closed")]
    Closed(RoomId),
    #[error("room `{0}` is already closed")]
    AlreadyClosed(RoomId),
}

impl RoomPhase {
    pub fn of(room: &RoomEntity) -> Self {
        if room.is_closed {
            RoomPhase::Closed
        } else {
            RoomPhase::Open
        }
    }

    pub fn accepts_mutations(self) -> bool {
        self == RoomPhase::Open
    }

    /// Phase after a close request, or why it is refused.
    pub fn close(self, room_id: RoomId) -> Result<RoomPhase, RoomPhaseError> {
        match self {
            RoomPhase::Open => Ok(RoomPhase::Closed),
            RoomPhase::Closed => Err(RoomPhaseError::AlreadyClosed(room_id)),
        }
    }
}

/// Fail unless the room still accepts question mutations.
pub fn ensure_open(room: &RoomEntity) -> Result<(), RoomPhaseError> {
    if RoomPhase::of(room).accepts_mutations() {
        Ok(())
    } else {
        Err(RoomPhaseError::Closed(room.id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn room(is_closed: bool) -> RoomEntity {
        RoomEntity {
            id: 5,
            code: 1234,
            title: "Talk".into(),
            creator_id: "presenter".into(),
            created_at: SystemTime::now(),
            is_closed,
            attachment: None,
        }
    }

    #[test]
    fn open_rooms_accept_mutations_and_close_once() {
        let open = room(false);
        assert_eq!(RoomPhase::of(&open), RoomPhase::Open);
        assert!(ensure_open(&open).is_ok());
        assert_eq!(RoomPhase::Open.close(5), Ok(RoomPhase::Closed));
    }

    #[test]
    fn closed_rooms_never_reopen() {
        let closed = room(true);
        assert_eq!(ensure_open(&closed), Err(RoomPhaseError::Closed(5)));
        assert_eq!(
            RoomPhase::of(&closed).close(5),
            Err(RoomPhaseError::AlreadyClosed(5))
        );
    }
}
