use std::fmt;

use super::{HANDLE_MASK, read_u16};
use crate::{Error, Result};

/// Packet boundary flag of an ACL data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketBoundary {
    FirstNonAutomaticallyFlushable,
    ContinuingFragment,
    FirstAutomaticallyFlushable,
    CompleteL2cap,
}

impl PacketBoundary {
    fn bits(self) -> u16 {
        match self {
            PacketBoundary::FirstNonAutomaticallyFlushable => 0b00,
            PacketBoundary::ContinuingFragment => 0b01,
            PacketBoundary::FirstAutomaticallyFlushable => 0b10,
            PacketBoundary::CompleteL2cap => 0b11,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => PacketBoundary::FirstNonAutomaticallyFlushable,
            0b01 => PacketBoundary::ContinuingFragment,
            0b10 => PacketBoundary::FirstAutomaticallyFlushable,
            _ => PacketBoundary::CompleteL2cap,
        }
    }

    /// Whether this fragment starts a new higher-layer PDU.
    pub fn is_first(self) -> bool {
        matches!(
            self,
            PacketBoundary::FirstNonAutomaticallyFlushable
                | PacketBoundary::FirstAutomaticallyFlushable
        )
    }
}

/// Broadcast flag of an ACL data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BroadcastFlag {
    PointToPoint,
    ActivePeripheralBroadcast,
}

/// An ACL data packet as it crosses the HCI.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AclPacket {
    pub handle: u16,
    pub boundary: PacketBoundary,
    pub broadcast: BroadcastFlag,
    pub payload: Vec<u8>,
}

impl AclPacket {
    pub fn new(
        handle: u16,
        boundary: PacketBoundary,
        broadcast: BroadcastFlag,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            handle: handle & HANDLE_MASK,
            boundary,
            broadcast,
            payload: payload.into(),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let len = u16::try_from(self.payload.len())
            .map_err(|_| Error::malformed("ACL payload exceeds 65535 bytes"))?;
        let broadcast: u16 = match self.broadcast {
            BroadcastFlag::PointToPoint => 0b00,
            BroadcastFlag::ActivePeripheralBroadcast => 0b01,
        };
        let header = (self.handle & HANDLE_MASK) | (self.boundary.bits() << 12) | (broadcast << 14);
        let mut bytes = Vec::with_capacity(self.payload.len() + 4);
        bytes.extend_from_slice(&header.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::malformed("ACL packet shorter than its header"));
        }
        let header = read_u16(bytes, 0);
        let len = read_u16(bytes, 2) as usize;
        if bytes.len() - 4 != len {
            return Err(Error::malformed(format!(
                "ACL length {len} does not match body of {} bytes",
                bytes.len() - 4
            )));
        }
        let broadcast = match (header >> 14) & 0b11 {
            0b00 => BroadcastFlag::PointToPoint,
            0b01 => BroadcastFlag::ActivePeripheralBroadcast,
            _ => return Err(Error::malformed("reserved ACL broadcast flag")),
        };
        Ok(Self {
            handle: header & HANDLE_MASK,
            boundary: PacketBoundary::from_bits(header >> 12),
            broadcast,
            payload: bytes[4..].to_vec(),
        })
    }
}

impl fmt::Debug for AclPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AclPacket")
            .field("handle", &format_args!("{:#05x}", self.handle))
            .field("boundary", &self.boundary)
            .field("broadcast", &self.broadcast)
            .field("payload", &format_args!("b\"{}\"", self.payload.escape_ascii()))
            .finish()
    }
}

/// Payload delivered to, or submitted through, the transport for one handle.
///
/// This is the unit carried by a connection's data stream.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AclData {
    pub handle: u16,
    pub payload: Vec<u8>,
}

impl AclData {
    pub fn new(handle: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            handle,
            payload: payload.into(),
        }
    }

    /// Whether `needle` occurs anywhere in the payload.
    pub fn payload_contains(&self, needle: &[u8]) -> bool {
        needle.is_empty() || self.payload.windows(needle.len()).any(|w| w == needle)
    }
}

impl fmt::Debug for AclData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AclData")
            .field("handle", &format_args!("{:#05x}", self.handle))
            .field("payload", &format_args!("b\"{}\"", self.payload.escape_ascii()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_flags_above_handle() {
        let packet = AclPacket::new(
            0x0001,
            PacketBoundary::FirstAutomaticallyFlushable,
            BroadcastFlag::ActivePeripheralBroadcast,
            b"hi".to_vec(),
        );
        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes, vec![0x01, 0x60, 0x02, 0x00, b'h', b'i']);
        assert_eq!(AclPacket::parse(&bytes).unwrap(), packet);
    }

    #[test]
    fn parse_rejects_bad_lengths_and_reserved_flags() {
        assert!(AclPacket::parse(&[0x01, 0x20, 0x05, 0x00, b'h']).is_err());
        assert!(AclPacket::parse(&[0x01, 0xa0, 0x00, 0x00]).is_err());
        assert!(AclPacket::parse(&[0x01]).is_err());
    }

    #[test]
    fn payload_search() {
        let data = AclData::new(1, b"\x29\x00\x07\x00This is just SomeMoreAclData".to_vec());
        assert!(data.payload_contains(b"SomeMoreAclData"));
        assert!(!data.payload_contains(b"SomeAclData"));
        assert!(data.payload_contains(b""));
        assert_eq!(
            format!("{data:?}"),
            "AclData { handle: 0x001, payload: b\")\\x00\\x07\\x00This is just SomeMoreAclData\" }"
        );
    }

    #[test]
    fn only_first_flags_start_a_pdu() {
        assert!(PacketBoundary::FirstAutomaticallyFlushable.is_first());
        assert!(PacketBoundary::FirstNonAutomaticallyFlushable.is_first());
        assert!(!PacketBoundary::ContinuingFragment.is_first());
        assert!(!PacketBoundary::CompleteL2cap.is_first());
    }
}
