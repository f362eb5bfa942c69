//! HCI packet shapes the harness reads and writes.
//!
//! Only the packets the ACL lifecycle needs are modelled: the connection and
//! disconnection events, the `Disconnect` command, and ACL data packets with
//! their boundary and broadcast flags. Everything else decodes to
//! [`HciEvent::Other`] and is treated as noise by the assertion engine.

mod acl;
mod command;
mod event_code;
mod event_packet;
mod hci_event;

pub use acl::{AclData, AclPacket, BroadcastFlag, PacketBoundary};
pub use command::{Disconnect, DisconnectReason, command_opcode};
pub use event_code::EventCode;
pub use event_packet::EventPacket;
pub use hci_event::{ConnectionComplete, ConnectionRequest, DisconnectionComplete, HciEvent};

/// Connection handles occupy the low 12 bits of their field.
pub const HANDLE_MASK: u16 = 0x0fff;

/// HCI status and error codes used by the lifecycle events.
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const PAGE_TIMEOUT: u8 = 0x04;
}

/// Link type carried in connection events.
pub mod link_type {
    pub const ACL: u8 = 0x01;
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_address(bytes: &[u8], at: usize) -> crate::Address {
    let mut octets = [0u8; 6];
    octets.copy_from_slice(&bytes[at..at + 6]);
    crate::Address::from_le_bytes(octets)
}
