use std::mem;

use crate::{Direction, Error, EventStream, Result, hci::EventPacket};

/// One outstanding connection request of a given direction.
#[derive(Debug, Default)]
pub(crate) enum Slot {
    #[default]
    Idle,
    Pending(EventStream<EventPacket>),
}

impl Slot {
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending(_))
    }

    pub(crate) fn ensure_idle(&self, direction: Direction) -> Result {
        match self {
            Slot::Idle => Ok(()),
            Slot::Pending(_) => Err(Error::AlreadyPending(direction)),
        }
    }

    /// Move the pending stream out, leaving the slot idle.
    pub(crate) fn take(&mut self, direction: Direction) -> Result<EventStream<EventPacket>> {
        match mem::take(self) {
            Slot::Pending(stream) => Ok(stream),
            Slot::Idle => Err(Error::NotPending(direction)),
        }
    }

    /// Drop any pending stream, closing it.
    pub(crate) fn clear(&mut self) {
        *self = Slot::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_slot_round_trip() {
        let mut slot = Slot::default();
        assert!(slot.ensure_idle(Direction::Incoming).is_ok());
        assert_eq!(
            slot.take(Direction::Incoming).unwrap_err(),
            Error::NotPending(Direction::Incoming)
        );

        slot = Slot::Pending(EventStream::recorded("incoming", []));
        assert!(slot.is_pending());
        assert_eq!(
            slot.ensure_idle(Direction::Incoming),
            Err(Error::AlreadyPending(Direction::Incoming))
        );

        let stream = slot.take(Direction::Incoming).unwrap();
        assert_eq!(stream.name(), "incoming");
        assert!(!slot.is_pending());
    }
}
