use super::Capture;
use crate::hci::{
    ConnectionComplete, ConnectionRequest, DisconnectionComplete, EventCode, EventPacket, HciEvent,
};

/// Captures for the lifecycle events carried by connection streams.
#[derive(Debug)]
pub struct HciCaptures;

impl HciCaptures {
    /// Matches Connection Complete and extracts handle, peer address and status.
    pub fn connection_complete() -> Capture<EventPacket, ConnectionComplete> {
        Capture::new("ConnectionComplete", |packet| {
            match decode(packet, EventCode::ConnectionComplete)? {
                HciEvent::ConnectionComplete(complete) => Some(complete),
                _ => None,
            }
        })
    }

    /// Matches Connection Request and extracts the requesting peer.
    pub fn connection_request() -> Capture<EventPacket, ConnectionRequest> {
        Capture::new("ConnectionRequest", |packet| {
            match decode(packet, EventCode::ConnectionRequest)? {
                HciEvent::ConnectionRequest(request) => Some(request),
                _ => None,
            }
        })
    }

    /// Matches Disconnection Complete and extracts the reason code.
    pub fn disconnection_complete() -> Capture<EventPacket, DisconnectionComplete> {
        Capture::new("DisconnectionComplete", |packet| {
            match decode(packet, EventCode::DisconnectionComplete)? {
                HciEvent::DisconnectionComplete(done) => Some(done),
                _ => None,
            }
        })
    }
}

fn decode(packet: &EventPacket, expected: EventCode) -> Option<HciEvent> {
    if packet.code() != expected {
        return None;
    }
    match packet.decode() {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(event = ?packet, error = %e, "ignoring malformed {expected}");
            None
        }
    }
}
